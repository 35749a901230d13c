#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![allow(clippy::needless_doctest_main)]

#![doc = include_str!("../README.md")]

pub mod core;

pub mod discovery;

#[doc(inline)]
pub use crate::core::event_data::object_centric::OCEL;

#[doc(inline)]
pub use crate::core::event_data::object_centric::linked_ocel::IndexLinkedOCEL;

#[doc(inline)]
pub use crate::core::event_data::case_centric::FlatEventLog;

#[doc(inline)]
pub use crate::core::process_models::dcr::{DcrGraph, OcDcrGraph, Relation, RelationType};

#[doc(inline)]
pub use discovery::case_centric::dcr::{DcrMiner, DisCoveR};

#[doc(inline)]
pub use discovery::object_centric::oc_dcr::{
    discover_oc_dcr, discover_oc_dcr_with_miner, ConfigError, OCDCRDiscoveryOptions,
};

///
/// Serialize an [`OcDcrGraph`] as a JSON [`String`]
///
pub fn oc_dcr_to_json(graph: &OcDcrGraph) -> Result<String, serde_json::Error> {
    serde_json::to_string(graph)
}

///
/// Deserialize an [`OcDcrGraph`] from a JSON [`String`]
///
pub fn json_to_oc_dcr(graph_json: &str) -> Result<OcDcrGraph, serde_json::Error> {
    serde_json::from_str(graph_json)
}

///
/// Serialize [`OCEL`] as a JSON [`String`]
///
/// [`serde_json`] can also be used to convert [`OCEL`] to other targets (e.g., `serde_json::to_writer`)
///
pub fn ocel_to_json(ocel: &OCEL) -> Result<String, serde_json::Error> {
    serde_json::to_string(ocel)
}

///
/// Import [`OCEL`] from a JSON [`String`]
///
/// [`serde_json`] can also be used to import [`OCEL`] from other targets (e.g., `serde_json::from_reader`)
///
pub fn json_to_ocel(ocel_json: &str) -> Result<OCEL, serde_json::Error> {
    serde_json::from_str(ocel_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
        let ocel = ocel![
            events:
            ("Create Order", ["Order:1"]),
            ("Ship Order", ["Order:1"]),
        ];
        let json = ocel_to_json(&ocel).unwrap();
        let ocel = json_to_ocel(&json).unwrap();
        assert_eq!(ocel.events.len(), 2);

        let mut graph = OcDcrGraph::new();
        graph.add_event("Create Order", None).unwrap();
        let graph = json_to_oc_dcr(&oc_dcr_to_json(&graph).unwrap()).unwrap();
        assert!(graph.contains_event("Create Order"));
    }
}
