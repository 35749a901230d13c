//! Validated input of an OC-DCR discovery run
use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::{
    event_data::object_centric::linked_ocel::{IndexLinkedOCEL, LinkedOCELAccess},
    process_models::dcr::DcrGraphError,
};

use super::OCDCRDiscoveryOptions;

/// Errors in the configuration of an OC-DCR discovery run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Object type is not part of the OCEL
    #[error("object type '{0}' is not an object type of the OCEL")]
    UnknownObjectType(String),
    /// Activity is not part of the OCEL
    #[error("activity '{0}' is not an activity of the OCEL")]
    UnknownActivity(String),
    /// Activities mapped to an object type while also being spawn activities
    #[error("activities cannot be both spawn activities and mapped activities: {0:?}")]
    SpawnActivityOverlap(Vec<String>),
    /// Derived entity pair with the same type on both sides
    #[error("derived entity pair must contain two different object types, got ('{0}', '{0}')")]
    DerivedEntitySelfPair(String),
    /// Graph operation failed during discovery
    #[error(transparent)]
    Graph(#[from] DcrGraphError),
}

/// Where an activity is placed in the discovered graph
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum ActivityMapping {
    /// Top-level graph
    TopLevel,
    /// Subgraph of the given object type
    Object(String),
}

impl ActivityMapping {
    /// Mapping into the subgraph of the given object type
    pub fn object<T: Into<String>>(object_type: T) -> Self {
        Self::Object(object_type.into())
    }
}

/// Role of an activity during discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityRole<'a> {
    /// Spawn activity of an object type
    Spawn,
    /// Non-spawn top-level activity
    TopLevel,
    /// Activity of an object subgraph
    Object(&'a str),
}

/// Activity mappings and OCEL of a discovery run, validated against each other
#[derive(Debug, Clone)]
pub struct DiscoveryData<'a> {
    locel: &'a IndexLinkedOCEL,
    spawn_mapping: BTreeMap<String, String>,
    spawned_types: BTreeMap<String, String>,
    activity_mapping: BTreeMap<String, ActivityMapping>,
    derived_entities: Option<Vec<(String, String)>>,
}

/// Activities occurring in the OCEL
fn log_activities(locel: &IndexLinkedOCEL) -> BTreeSet<&str> {
    locel
        .get_ev_types()
        .filter(|act| locel.get_evs_of_type(act).next().is_some())
        .collect()
}

impl<'a> DiscoveryData<'a> {
    /// Validate the options against the OCEL
    ///
    /// Object types without spawn activity are reported as unspawned and activities without
    /// mapping are mapped to the top level (both with a warning).
    pub fn new(
        locel: &'a IndexLinkedOCEL,
        options: &OCDCRDiscoveryOptions,
    ) -> Result<Self, ConfigError> {
        let object_types: BTreeSet<&str> = locel.get_ob_types().collect();
        let activities = log_activities(locel);
        let check_type = |t: &str| {
            if object_types.contains(t) {
                Ok(())
            } else {
                Err(ConfigError::UnknownObjectType(t.to_string()))
            }
        };
        let check_activity = |a: &str| {
            if activities.contains(a) {
                Ok(())
            } else {
                Err(ConfigError::UnknownActivity(a.to_string()))
            }
        };

        if let Some(derived) = &options.derived_entities {
            for (a, b) in derived {
                if a == b {
                    return Err(ConfigError::DerivedEntitySelfPair(a.clone()));
                }
                check_type(a)?;
                check_type(b)?;
            }
        }

        let spawn_mapping: BTreeMap<String, String> = options
            .spawn_mapping
            .iter()
            .map(|(t, a)| (t.clone(), a.clone()))
            .collect();
        for object_type in spawn_mapping.keys() {
            check_type(object_type)?;
        }
        for object_type in &object_types {
            if !spawn_mapping.contains_key(*object_type) {
                tracing::warn!(
                    "Object type '{object_type}' has no spawn activity and is treated as unspawned"
                );
            }
        }

        for activity in spawn_mapping.values() {
            check_activity(activity)?;
        }
        let mut spawned_types: BTreeMap<String, String> = BTreeMap::new();
        for (object_type, activity) in &spawn_mapping {
            spawned_types
                .entry(activity.clone())
                .or_insert_with(|| object_type.clone());
        }
        let overlap: Vec<String> = spawned_types
            .keys()
            .filter(|a| options.activity_mapping.contains_key(*a))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::SpawnActivityOverlap(overlap));
        }

        let mut activity_mapping: BTreeMap<String, ActivityMapping> = BTreeMap::new();
        for (activity, mapping) in &options.activity_mapping {
            if let ActivityMapping::Object(object_type) = mapping {
                check_type(object_type)?;
            }
            check_activity(activity)?;
            activity_mapping.insert(activity.clone(), mapping.clone());
        }
        for activity in &activities {
            if !spawned_types.contains_key(*activity) && !activity_mapping.contains_key(*activity) {
                tracing::warn!(
                    "Activity '{activity}' has no associated object type and is placed on the top level"
                );
                activity_mapping.insert(activity.to_string(), ActivityMapping::TopLevel);
            }
        }

        Ok(Self {
            locel,
            spawn_mapping,
            spawned_types,
            activity_mapping,
            derived_entities: options.derived_entities.clone(),
        })
    }

    /// The linked OCEL
    pub fn locel(&self) -> &'a IndexLinkedOCEL {
        self.locel
    }

    /// Role of an activity (`None` for activities that are neither spawn nor mapped)
    pub fn get_activity_mapping(&self, activity: &str) -> Option<ActivityRole<'_>> {
        if self.spawned_types.contains_key(activity) {
            return Some(ActivityRole::Spawn);
        }
        self.activity_mapping.get(activity).map(|m| match m {
            ActivityMapping::TopLevel => ActivityRole::TopLevel,
            ActivityMapping::Object(t) => ActivityRole::Object(t.as_str()),
        })
    }

    /// Map (or re-map) an activity
    pub fn set_activity_mapping<T: Into<String>>(&mut self, activity: T, mapping: ActivityMapping) {
        self.activity_mapping.insert(activity.into(), mapping);
    }

    /// Mapped (non-spawn) activities
    pub fn activities(&self) -> impl Iterator<Item = &str> {
        self.activity_mapping.keys().map(String::as_str)
    }

    /// Object type the activity belongs to, if it is an activity of an object subgraph
    pub fn object_type_of(&self, activity: &str) -> Option<&str> {
        match self.get_activity_mapping(activity) {
            Some(ActivityRole::Object(t)) => Some(t),
            _ => None,
        }
    }

    /// Whether the activity is a spawn activity
    pub fn is_spawn_activity(&self, activity: &str) -> bool {
        self.spawned_types.contains_key(activity)
    }

    /// Whether the activity is a top-level activity which does not spawn objects
    pub fn is_no_spawn_in_top_level(&self, activity: &str) -> bool {
        self.get_activity_mapping(activity) == Some(ActivityRole::TopLevel)
    }

    /// Whether the activity belongs to an object subgraph
    pub fn is_from_subgraph(&self, activity: &str) -> bool {
        self.object_type_of(activity).is_some()
    }

    /// Spawned object types
    pub fn spawned_object_types(&self) -> impl Iterator<Item = &str> {
        self.spawn_mapping.keys().map(String::as_str)
    }

    /// Whether the object type has a spawn activity
    pub fn is_spawned_object_type(&self, object_type: &str) -> bool {
        self.spawn_mapping.contains_key(object_type)
    }

    /// Spawn activity of an object type
    pub fn spawn_activity_of(&self, object_type: &str) -> Option<&str> {
        self.spawn_mapping.get(object_type).map(String::as_str)
    }

    /// Object type spawned by a spawn activity
    pub fn spawned_type_of(&self, activity: &str) -> Option<&str> {
        self.spawned_types.get(activity).map(String::as_str)
    }

    /// Activities mapped to the subgraph of an object type
    pub fn spawned_activities_of(&self, object_type: &str) -> Vec<&str> {
        self.activity_mapping
            .iter()
            .filter(|(_, m)| matches!(m, ActivityMapping::Object(t) if t == object_type))
            .map(|(a, _)| a.as_str())
            .collect()
    }

    /// Derived entity pairs (`None`: all pairs are derived)
    pub fn derived_entities(&self) -> Option<&[(String, String)]> {
        self.derived_entities.as_deref()
    }

    /// Whether two object types are listed as derived entities (in either order)
    pub fn are_derived_entities(&self, a: &str, b: &str) -> bool {
        self.derived_entities.as_ref().is_some_and(|derived| {
            derived
                .iter()
                .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
        })
    }

    /// Object types of all objects related to events of the activity
    pub fn correlated_object_types(&self, activity: &str) -> BTreeSet<&'a str> {
        let locel = self.locel;
        locel
            .get_evs_of_type(activity)
            .flat_map(|ev| locel.get_e2o(ev).map(|(_, ob)| locel.get_ob_type_of(ob)))
            .collect()
    }
}
