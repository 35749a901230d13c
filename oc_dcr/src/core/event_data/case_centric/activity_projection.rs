use std::collections::HashMap;

use super::flat_log::FlatEventLog;

#[derive(Debug, Clone, Default)]
/// Projection of an event log on just activity labels
///
/// Identical traces (variants) are stored once, together with their frequency.
pub struct EventLogActivityProjection {
    /// Activity labels, indexed by activity index
    pub activities: Vec<String>,
    /// Activity label to activity index
    pub act_to_index: HashMap<String, usize>,
    /// Trace variants (sequences of activity indices) with their frequency
    pub traces: Vec<(Vec<usize>, u64)>,
}

impl EventLogActivityProjection {
    /// Index of an activity label
    pub fn index_of(&self, activity: &str) -> Option<usize> {
        self.act_to_index.get(activity).copied()
    }
}

impl From<&FlatEventLog> for EventLogActivityProjection {
    fn from(log: &FlatEventLog) -> Self {
        let mut act_to_index: HashMap<String, usize> = HashMap::new();
        let mut activities: Vec<String> = Vec::new();
        let mut traces: HashMap<Vec<usize>, u64> = HashMap::new();
        for (_, rows) in log.traces() {
            let mut trace_acts: Vec<usize> = Vec::with_capacity(rows.len());
            for row in rows {
                let act = row.activity.as_str();
                if let Some(index) = act_to_index.get(act) {
                    trace_acts.push(*index);
                } else {
                    let new_act_index = activities.len();
                    activities.push(act.to_string());
                    act_to_index.insert(act.to_string(), new_act_index);
                    trace_acts.push(new_act_index)
                }
            }
            *traces.entry(trace_acts).or_insert(0) += 1;
        }
        let mut traces: Vec<(Vec<usize>, u64)> = traces.into_iter().collect();
        traces.sort();
        Self {
            activities,
            act_to_index,
            traces,
        }
    }
}
