//! Discovery of many-to-many (synchronizing) relations between object subgraphs
//!
//! Objects sharing events are merged into transitive closures. Each closure forms one trace of a
//! closure log, on which excludes are mined and universally quantified conditions and responses
//! are checked.
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::unionfind::UnionFind;

use crate::{
    core::{
        event_data::{
            case_centric::{FlatEventLog, FlatLogRow},
            object_centric::linked_ocel::{
                EventIndex, IndexLinkedOCEL, LinkedOCELAccess, ObjectIndex,
            },
        },
        process_models::dcr::{DcrGraphError, Event, OcDcrGraph, Relation, RelationType},
    },
    discovery::case_centric::dcr::DcrMiner,
};

use super::{
    data::{ActivityRole, DiscoveryData},
    optimization::transitive_reduction,
};

/// Group objects into closures of objects (transitively) sharing events
///
/// Only events with at least two distinct objects link objects. Objects never sharing an event
/// with another object are not part of any closure. Closures are ordered by their smallest object.
pub fn compute_transitive_closures(locel: &IndexLinkedOCEL) -> Vec<BTreeSet<ObjectIndex>> {
    let num_obs = locel.num_objects();
    let mut union_find: UnionFind<usize> = UnionFind::new(num_obs);
    let mut linked: BTreeSet<ObjectIndex> = BTreeSet::new();
    for ev in locel.get_all_evs_ref() {
        let obs = locel.get_e2o_set(ev);
        if obs.len() < 2 {
            continue;
        }
        let mut obs = obs.iter();
        if let Some(first) = obs.next() {
            linked.insert(*first);
            for ob in obs {
                union_find.union(first.into_inner(), ob.into_inner());
                linked.insert(*ob);
            }
        }
    }

    let mut closures: BTreeMap<usize, BTreeSet<ObjectIndex>> = BTreeMap::new();
    for ob in linked {
        closures
            .entry(union_find.find_mut(ob.into_inner()))
            .or_default()
            .insert(ob);
    }
    let mut closures: Vec<BTreeSet<ObjectIndex>> = closures.into_values().collect();
    closures.sort_by_key(|c| c.first().copied());
    closures
}

/// Object an event is attributed to in the closure log
///
/// Spawn events are attributed to the object they spawn, events of an object subgraph to an
/// object of that type. Otherwise the first related object is used (if any).
pub fn resolve_object_id(data: &DiscoveryData<'_>, ev: &EventIndex) -> Option<String> {
    let locel = data.locel();
    let activity = locel.get_ev_type_of(ev);
    let role = data.get_activity_mapping(activity);
    let mut first = None;
    for (_, ob) in locel.get_e2o(ev) {
        let ob_type = locel.get_ob_type_of(ob);
        let matches = match role {
            Some(ActivityRole::Spawn) => data.spawn_activity_of(ob_type) == Some(activity),
            Some(ActivityRole::Object(t)) => t == ob_type,
            _ => false,
        };
        if matches {
            return Some(locel.get_ob_id(ob).to_string());
        }
        first.get_or_insert(ob);
    }
    first.map(|ob| locel.get_ob_id(ob).to_string())
}

/// Build the closure log: one trace `closure_{idx}` per closure with the events of all its objects
///
/// Returns `None` if there are no closures.
pub fn log_from_closures(
    data: &DiscoveryData<'_>,
    closures: &[BTreeSet<ObjectIndex>],
) -> Option<FlatEventLog> {
    if closures.is_empty() {
        return None;
    }
    let locel = data.locel();
    let mut log = FlatEventLog::new();
    for (idx, closure) in closures.iter().enumerate() {
        let trace_id = format!("closure_{idx}");
        let mut seen: HashSet<EventIndex> = HashSet::new();
        for ob in closure {
            for (_, ev) in locel.get_e2o_rev(ob) {
                if !seen.insert(*ev) {
                    continue;
                }
                log.push(FlatLogRow::new(
                    trace_id.as_str(),
                    locel.get_ev_type_of(ev),
                    *locel.get_ev_time(ev),
                    resolve_object_id(data, ev),
                ));
            }
        }
    }
    log.sort();
    Some(log)
}

/// Whether both endpoints of the relation are events of the graph
fn is_known(graph: &OcDcrGraph, relation: &Relation) -> bool {
    graph.contains_event(relation.start.as_str()) && graph.contains_event(relation.target.as_str())
}

/// Mine the closure log and add all discovered excludes between spawned events
pub fn add_many_to_many_excludes<M: DcrMiner>(
    log: &FlatEventLog,
    miner: &M,
    graph: &mut OcDcrGraph,
) -> Result<(), DcrGraphError> {
    let mined = miner.mine(log);
    let mut excludes: Vec<Relation> = mined
        .relations()
        .filter(|r| r.relation_type == RelationType::Exclude)
        .filter(|r| is_known(graph, r))
        .cloned()
        .collect();
    excludes.sort();
    tracing::debug!("Found {} many-to-many exclude candidates", excludes.len());
    graph.partition(excludes)
}

/// Whether every object in `objects` executed `activity` according to the lookup
fn all_instances_in<F: Fn(&(&str, Option<&str>)) -> bool>(
    activity: &str,
    objects: Option<&BTreeSet<&str>>,
    contains: F,
) -> bool {
    objects
        .into_iter()
        .flatten()
        .all(|ob| contains(&(activity, Some(*ob))))
}

/// Discover synchronizing conditions and responses between activities of object subgraphs
///
/// Starting from all pairs of distinct subgraph activities, a condition `y -> x` survives if,
/// whenever `x` occurs in a closure trace, every object that spawned `y` executed `y` before.
/// A response `x -> y` survives if every such object executes `y` afterwards. Both are
/// transitively reduced and added as universally quantified relations.
pub fn find_conditions_responses(
    data: &DiscoveryData<'_>,
    log: &FlatEventLog,
    graph: &mut OcDcrGraph,
) -> Result<(), DcrGraphError> {
    let locel = data.locel();
    let activities = log.activities();
    let spawned: BTreeSet<&str> = activities
        .iter()
        .copied()
        .filter(|a| data.is_from_subgraph(a))
        .collect();
    let mut conditions: BTreeMap<&str, BTreeSet<&str>> = spawned
        .iter()
        .map(|a| (*a, spawned.iter().copied().filter(|b| b != a).collect()))
        .collect();
    let mut responses = conditions.clone();

    for (_, rows) in log.traces() {
        let mut spawned_objects: HashMap<&str, BTreeSet<&str>> =
            spawned.iter().map(|a| (*a, BTreeSet::new())).collect();
        let mut prefix: HashSet<(&str, Option<&str>)> = HashSet::new();
        let mut suffix: HashMap<(&str, Option<&str>), usize> = HashMap::new();
        for row in &rows {
            *suffix
                .entry((row.activity.as_str(), row.object_id.as_deref()))
                .or_default() += 1;
        }

        for row in &rows {
            let activity = row.activity.as_str();
            let key = (activity, row.object_id.as_deref());
            if let Some(count) = suffix.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    suffix.remove(&key);
                }
            }

            if data.is_from_subgraph(activity) {
                if let Some(conds) = conditions.get_mut(activity) {
                    conds.retain(|y| {
                        all_instances_in(y, spawned_objects.get(y), |k| prefix.contains(k))
                    });
                }
                if let Some(resps) = responses.get_mut(activity) {
                    resps.retain(|y| {
                        all_instances_in(y, spawned_objects.get(y), |k| suffix.contains_key(k))
                    });
                }
            } else if let Some(object_type) = data.spawned_type_of(activity) {
                let spawned_object = row
                    .object_id
                    .as_deref()
                    .and_then(|oid| locel.get_ob_by_id(oid).map(|ob| (oid, ob)))
                    .filter(|(_, ob)| locel.get_ob_type_of(ob) == object_type);
                if let Some((oid, _)) = spawned_object {
                    for a in data.spawned_activities_of(object_type) {
                        spawned_objects.entry(a).or_default().insert(oid);
                    }
                }
            }

            prefix.insert(key);
        }
    }

    let conditions: Vec<Relation> = conditions
        .iter()
        .flat_map(|(target, sources)| {
            sources.iter().map(move |source| {
                Relation::with_quantifiers(
                    Event::new(*source),
                    Event::new(*target),
                    RelationType::Condition,
                    true,
                    true,
                )
            })
        })
        .collect();
    let responses: Vec<Relation> = responses
        .iter()
        .flat_map(|(source, targets)| {
            targets.iter().map(move |target| {
                Relation::with_quantifiers(
                    Event::new(*source),
                    Event::new(*target),
                    RelationType::Response,
                    true,
                    true,
                )
            })
        })
        .collect();
    let conditions: Vec<Relation> = transitive_reduction(&conditions)
        .into_iter()
        .filter(|r| is_known(graph, r))
        .collect();
    let responses: Vec<Relation> = transitive_reduction(&responses)
        .into_iter()
        .filter(|r| is_known(graph, r))
        .collect();
    tracing::debug!(
        "Found {} synchronizing conditions and {} synchronizing responses",
        conditions.len(),
        responses.len()
    );
    graph.partition(conditions)?;
    graph.partition(responses)
}
