//! Discovering DCR Graphs from Flat Event Logs
use crate::{
    core::{
        event_data::case_centric::{EventLogActivityProjection, FlatEventLog},
        process_models::dcr::{DcrGraph, Event, Relation, RelationType},
    },
    discovery::object_centric::oc_dcr::optimization::transitive_reduction,
};

/// Mining primitive turning a flat event log into a DCR graph
///
/// Object-centric discovery is generic over this trait, so any miner can be plugged in.
/// Closures `Fn(&FlatEventLog) -> DcrGraph` implement it as well.
pub trait DcrMiner {
    /// Discover a DCR graph from the given log
    fn mine(&self, log: &FlatEventLog) -> DcrGraph;
}

impl<F: Fn(&FlatEventLog) -> DcrGraph> DcrMiner for F {
    fn mine(&self, log: &FlatEventLog) -> DcrGraph {
        self(log)
    }
}

/// DisCoveR-style DCR miner
///
/// Mines the following relations on the activity projection of the log:
///
/// * every activity is included initially,
/// * `Exclude(a, b)` if `b` never occurs after an occurrence of `a` (for `a == b`: `a` occurs at most once per trace),
/// * `Condition(a, b)` if in every trace containing `b`, `a` occurs before the first `b`,
/// * `Response(a, b)` if in every trace containing `a`, `b` occurs after the last `a`.
///
/// Conditions and responses are transitively reduced.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisCoveR;

impl DcrMiner for DisCoveR {
    fn mine(&self, log: &FlatEventLog) -> DcrGraph {
        let proj = EventLogActivityProjection::from(log);
        discover_dcr(&proj)
    }
}

/// Discover a DCR graph from an activity projection (see [`DisCoveR`])
pub fn discover_dcr(proj: &EventLogActivityProjection) -> DcrGraph {
    let n = proj.activities.len();
    let mut follows = vec![vec![false; n]; n];
    let mut condition = vec![vec![true; n]; n];
    let mut response = vec![vec![true; n]; n];

    for (trace, _) in &proj.traces {
        let mut first: Vec<Option<usize>> = vec![None; n];
        let mut last: Vec<Option<usize>> = vec![None; n];
        let mut seen = vec![false; n];
        for (pos, &act) in trace.iter().enumerate() {
            for (prev, &was_seen) in seen.iter().enumerate() {
                if was_seen {
                    follows[prev][act] = true;
                }
            }
            seen[act] = true;
            first[act].get_or_insert(pos);
            last[act] = Some(pos);
        }
        for a in 0..n {
            for b in 0..n {
                if let Some(first_b) = first[b] {
                    if first[a].map_or(true, |first_a| first_a > first_b) {
                        condition[a][b] = false;
                    }
                }
                if let Some(last_a) = last[a] {
                    if last[b].map_or(true, |last_b| last_b < last_a) {
                        response[a][b] = false;
                    }
                }
            }
        }
    }

    let mut graph = DcrGraph::new();
    let events: Vec<Event> = proj
        .activities
        .iter()
        .map(|a| graph.add_event(a.as_str()))
        .collect();
    let mut conditions = Vec::new();
    let mut responses = Vec::new();
    for a in 0..n {
        for b in 0..n {
            if !follows[a][b] {
                graph.insert_relation(Relation::new(
                    events[a].clone(),
                    events[b].clone(),
                    RelationType::Exclude,
                ));
            }
            if a == b {
                continue;
            }
            if condition[a][b] {
                conditions.push(Relation::new(
                    events[a].clone(),
                    events[b].clone(),
                    RelationType::Condition,
                ));
            }
            if response[a][b] {
                responses.push(Relation::new(
                    events[a].clone(),
                    events[b].clone(),
                    RelationType::Response,
                ));
            }
        }
    }
    for r in transitive_reduction(&conditions)
        .into_iter()
        .chain(transitive_reduction(&responses))
    {
        graph.insert_relation(r);
    }
    graph
}
