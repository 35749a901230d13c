//! Handling of object types without spawn activity
//!
//! Activities of unspawned object types behave exactly like top-level activities during
//! discovery. They are therefore mapped to the top level first and only grouped into their
//! (spawn-less) object at the end.
use std::collections::{BTreeMap, BTreeSet};

use crate::core::{
    event_data::object_centric::linked_ocel::LinkedOCELAccess,
    process_models::dcr::{DcrGraphError, OcDcrGraph},
};

use super::data::{ActivityMapping, DiscoveryData};

/// Remembers which activities belong to which unspawned object type
#[derive(Debug, Clone, Default)]
pub struct UnspawnedObjectHandler {
    unspawned_types: BTreeSet<String>,
    activity_types: BTreeMap<String, String>,
}

impl UnspawnedObjectHandler {
    /// Collect all object types of the OCEL without spawn activity
    pub fn new(data: &DiscoveryData<'_>) -> Self {
        Self {
            unspawned_types: data
                .locel()
                .get_ob_types()
                .filter(|t| !data.is_spawned_object_type(t))
                .map(str::to_string)
                .collect(),
            activity_types: BTreeMap::new(),
        }
    }

    /// Object types without spawn activity
    pub fn unspawned_types(&self) -> &BTreeSet<String> {
        &self.unspawned_types
    }

    /// Re-map all activities of unspawned object types to the top level
    pub fn handle_input_mapping(&mut self, data: &mut DiscoveryData<'_>) {
        let remapped: Vec<(String, String)> = data
            .activities()
            .filter_map(|a| {
                let t = data.object_type_of(a)?;
                self.unspawned_types
                    .contains(t)
                    .then(|| (a.to_string(), t.to_string()))
            })
            .collect();
        for (activity, object_type) in remapped {
            data.set_activity_mapping(activity.as_str(), ActivityMapping::TopLevel);
            self.activity_types.insert(activity, object_type);
        }
    }

    /// Activities originally mapped to the given unspawned object type
    pub fn activities_of<'s>(&'s self, object_type: &'s str) -> impl Iterator<Item = &'s str> {
        self.activity_types
            .iter()
            .filter(move |(_, t)| *t == object_type)
            .map(|(a, _)| a.as_str())
    }

    /// Move the activities of every unspawned object type into a new object without spawn
    ///
    /// An object is created for every unspawned type, even if no activity belongs to it.
    pub fn group_unspawned_activities(&self, graph: &mut OcDcrGraph) -> Result<(), DcrGraphError> {
        for object_type in &self.unspawned_types {
            let events: Vec<&str> = self
                .activities_of(object_type)
                .filter(|a| graph.contains_event(a))
                .collect();
            graph.group_top_level_events_into_unspawned_object(events, object_type)?;
        }
        Ok(())
    }
}
