//! Discovering OC-DCR Graphs from Object-Centric Event Data
//!
//! The discovery mines a base DCR graph from per-object traces, splits it into a top level and
//! one subgraph per spawned object type, adds synchronizing (many-to-many) relations found on
//! closures of related objects and finally optimizes all relation layers.
use std::{collections::HashMap, time::Instant};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        event_data::object_centric::linked_ocel::IndexLinkedOCEL, process_models::dcr::OcDcrGraph,
    },
    discovery::case_centric::dcr::{DcrMiner, DisCoveR},
};

pub mod data;
pub mod initial;
pub mod many_to_many;
pub mod nesting;
pub mod optimization;
pub mod unspawned;

pub use data::{ActivityMapping, ConfigError, DiscoveryData};

/// Options for the discovery of OC-DCR graphs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OCDCRDiscoveryOptions {
    /// Spawn activity per object type
    ///
    /// Object types of the OCEL without a spawn activity are treated as unspawned.
    pub spawn_mapping: HashMap<String, String>,
    /// Placement of (non-spawn) activities
    ///
    /// Activities of the OCEL without mapping are placed on the top level.
    pub activity_mapping: HashMap<String, ActivityMapping>,
    /// Pairs of object types between which synchronizing relations are kept
    ///
    /// `None` keeps all synchronizing relations, an empty list removes all of them.
    pub derived_entities: Option<Vec<(String, String)>>,
    /// Whether object subgraphs should be nested (i.e., events grouped by shared relations)
    pub apply_nested: bool,
}

impl OCDCRDiscoveryOptions {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Discover an [`OcDcrGraph`] using the [`DisCoveR`] miner
///
/// See [`discover_oc_dcr_with_miner`].
pub fn discover_oc_dcr(
    locel: &IndexLinkedOCEL,
    options: OCDCRDiscoveryOptions,
) -> Result<OcDcrGraph, ConfigError> {
    discover_oc_dcr_with_miner(locel, options, &DisCoveR)
}

/// Discover an [`OcDcrGraph`] using the given DCR miner
///
/// The options are validated against the OCEL first; invalid options result in a
/// [`ConfigError`] before any discovery step runs.
pub fn discover_oc_dcr_with_miner<M: DcrMiner>(
    locel: &IndexLinkedOCEL,
    options: OCDCRDiscoveryOptions,
    miner: &M,
) -> Result<OcDcrGraph, ConfigError> {
    let total = Instant::now();
    let mut data = DiscoveryData::new(locel, &options)?;

    let now = Instant::now();
    let mut unspawned = unspawned::UnspawnedObjectHandler::new(&data);
    unspawned.handle_input_mapping(&mut data);
    tracing::info!(
        "Mapped {} unspawned object types to the top level in {:?}",
        unspawned.unspawned_types().len(),
        now.elapsed()
    );

    let now = Instant::now();
    let log = initial::extract_object_traces(&data);
    tracing::info!("Extracted {} object trace rows in {:?}", log.len(), now.elapsed());

    let now = Instant::now();
    let mut mined = miner.mine(&log);
    initial::backfill_activities(&data, &mut mined);
    tracing::info!(
        "Mined base graph with {} events and {} relations in {:?}",
        mined.events().len(),
        mined.relation_count(),
        now.elapsed()
    );

    let now = Instant::now();
    let mut graph = initial::translate_to_oc_dcr(&data, mined)?;
    tracing::info!("Translated base graph in {:?}", now.elapsed());

    let now = Instant::now();
    let closures = many_to_many::compute_transitive_closures(locel);
    match many_to_many::log_from_closures(&data, &closures) {
        Some(closure_log) => {
            many_to_many::add_many_to_many_excludes(&closure_log, miner, &mut graph)?;
            many_to_many::find_conditions_responses(&data, &closure_log, &mut graph)?;
            tracing::info!(
                "Discovered synchronizing relations on {} closures in {:?}",
                closures.len(),
                now.elapsed()
            );
        }
        None => tracing::info!("No related objects, skipping synchronizing relations"),
    }

    let now = Instant::now();
    unspawned.group_unspawned_activities(&mut graph)?;
    tracing::info!("Grouped unspawned activities in {:?}", now.elapsed());

    if options.apply_nested {
        let now = Instant::now();
        optimization::create_nestings_for_subgraphs(&mut graph)?;
        tracing::info!("Nested object subgraphs in {:?}", now.elapsed());
    }

    let now = Instant::now();
    optimization::optimize_relations(&mut graph);
    optimization::filter_for_derived_entities(&mut graph, data.derived_entities());
    tracing::info!("Optimized relations in {:?}", now.elapsed());

    tracing::info!("Discovered OC-DCR graph in {:?}", total.elapsed());
    Ok(graph)
}
