//! Initial discovery: from per-object traces to the basic OC-DCR structure
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::core::{
    event_data::{
        case_centric::{FlatEventLog, FlatLogRow},
        object_centric::linked_ocel::LinkedOCELAccess,
    },
    process_models::dcr::{DcrGraph, DcrGraphError, Event, OcDcrGraph, OcDcrObject, Relation},
};

use super::data::DiscoveryData;

/// Flatten the OCEL into one trace per object
///
/// Each trace contains the events of one object (in time order, an event at most once) and is
/// identified by the object id. Traces of all object types are concatenated.
pub fn extract_object_traces(data: &DiscoveryData<'_>) -> FlatEventLog {
    let locel = data.locel();
    let mut object_types: Vec<&str> = locel.get_ob_types().collect();
    object_types.sort();
    let mut log = FlatEventLog::new();
    for object_type in object_types {
        for ob in locel.get_obs_of_type(object_type) {
            let object_id = locel.get_ob_id(ob);
            let mut seen = HashSet::new();
            for (_, ev) in locel.get_e2o_rev(ob) {
                if !seen.insert(*ev) {
                    continue;
                }
                log.push(FlatLogRow::new(
                    object_id,
                    locel.get_ev_type_of(ev),
                    *locel.get_ev_time(ev),
                    None,
                ));
            }
        }
    }
    log
}

/// Add all mapped activities missing in the mined graph as unconstrained events
///
/// Activities only occurring in events without objects never show up in object traces.
pub fn backfill_activities(data: &DiscoveryData<'_>, mined: &mut DcrGraph) {
    for activity in data.activities() {
        if !mined.contains_event(activity) {
            tracing::debug!("Adding activity '{activity}' without constraints");
            mined.add_event(activity);
        }
    }
}

/// Quantify a relation crossing from or into an object subgraph
fn quantify(data: &DiscoveryData<'_>, relation: Relation) -> Relation {
    let (head, tail) = if data.is_from_subgraph(relation.start.as_str()) {
        (true, false)
    } else if data.is_from_subgraph(relation.target.as_str()) {
        (false, true)
    } else {
        (false, false)
    };
    Relation::with_quantifiers(
        relation.start,
        relation.target,
        relation.relation_type,
        head,
        tail,
    )
}

/// Whether the relation connects a spawn activity with an activity of the object it spawns
fn is_between_spawn_and_spawned(data: &DiscoveryData<'_>, relation: &Relation) -> bool {
    let (start, target) = (relation.start.as_str(), relation.target.as_str());
    let (spawn, sub) = if data.is_spawn_activity(start) && data.is_from_subgraph(target) {
        (start, target)
    } else if data.is_spawn_activity(target) && data.is_from_subgraph(start) {
        (target, start)
    } else {
        return false;
    };
    data.object_type_of(sub)
        .and_then(|t| data.spawn_activity_of(t))
        .is_some_and(|s| s == spawn)
}

fn sorted_events<F: Fn(&str) -> bool>(graph: &DcrGraph, filter: F) -> Vec<String> {
    let mut events: Vec<String> = graph
        .events()
        .iter()
        .filter(|e| filter(e.as_str()))
        .map(Event::to_string)
        .collect();
    events.sort();
    events
}

/// Split the mined graph into the top level and one subgraph per spawned object type
///
/// 1. Non-spawn top-level events move to the top level together with their relations, which
///    get one-to-many quantifiers if the other side belongs to a subgraph.
/// 2. Spawn events move to the top level; their relations are kept (quantified the same way),
///    except those with activities of the spawned object.
/// 3. The remaining events form the subgraphs of their object types, keeping relations within
///    the same object type.
/// 4. Top-level relations between activities without a common object type are removed.
pub fn translate_to_oc_dcr(
    data: &DiscoveryData<'_>,
    mut mined: DcrGraph,
) -> Result<OcDcrGraph, DcrGraphError> {
    let mut oc_dcr = OcDcrGraph::new();

    for event in sorted_events(&mined, |e| data.is_no_spawn_in_top_level(e)) {
        let relations = mined.get_incidental_relations(&event);
        let marking = mined.event_marking(&event);
        mined.remove_event(&event)?;
        oc_dcr.add_event_with_marking(event.as_str(), marking, None, None)?;
        for r in relations {
            oc_dcr.insert_top_level_relation(quantify(data, r));
        }
    }

    let spawn_events = sorted_events(&mined, |e| data.is_spawn_activity(e));
    let spawn_relations: BTreeSet<Relation> = spawn_events
        .iter()
        .flat_map(|e| mined.get_incidental_relations(e))
        .filter(|r| !is_between_spawn_and_spawned(data, r))
        .map(|r| quantify(data, r))
        .collect();
    for event in &spawn_events {
        let marking = mined.event_marking(event);
        oc_dcr.add_event_with_marking(event.as_str(), marking, None, None)?;
        mined.remove_event(event)?;
    }
    for r in spawn_relations {
        oc_dcr.insert_top_level_relation(r);
    }

    let mut subgraphs: BTreeMap<&str, DcrGraph> = data
        .spawned_object_types()
        .map(|t| (t, DcrGraph::new()))
        .collect();
    for event in sorted_events(&mined, |_| true) {
        match data
            .object_type_of(&event)
            .and_then(|t| subgraphs.get_mut(t))
        {
            Some(subgraph) => {
                subgraph.add_event_with_marking(
                    event.as_str(),
                    mined.event_marking(&event),
                    None,
                )?;
            }
            None => tracing::warn!(
                "Activity '{event}' does not belong to a spawned object type and is dropped"
            ),
        }
    }
    let mut relations: Vec<&Relation> = mined.relations().collect();
    relations.sort();
    for r in relations {
        let start_type = data.object_type_of(r.start.as_str());
        if start_type.is_none() || start_type != data.object_type_of(r.target.as_str()) {
            continue;
        }
        if let Some(subgraph) = start_type.and_then(|t| subgraphs.get_mut(t)) {
            subgraph.add_relation(&r.start, &r.target, r.relation_type)?;
        }
    }

    for (object_type, subgraph) in subgraphs {
        let spawn = data.spawn_activity_of(object_type).map(Event::new);
        oc_dcr.add_object(OcDcrObject::new(spawn, object_type, subgraph));
    }

    let mut correlated: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for r in oc_dcr.top_level().relations() {
        for e in [r.start.as_str(), r.target.as_str()] {
            if !correlated.contains_key(e) {
                correlated.insert(e, data.correlated_object_types(e));
            }
        }
    }
    let unrelated: Vec<Relation> = oc_dcr
        .top_level()
        .relations()
        .filter(|r| {
            match (
                correlated.get(r.start.as_str()),
                correlated.get(r.target.as_str()),
            ) {
                (Some(s), Some(t)) => s.is_disjoint(t),
                _ => true,
            }
        })
        .cloned()
        .collect();
    for r in &unrelated {
        oc_dcr.remove_relation(r);
    }
    Ok(oc_dcr)
}
