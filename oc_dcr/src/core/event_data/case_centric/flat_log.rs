use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A row of a [`FlatEventLog`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatLogRow {
    /// Trace (case) identifier
    pub trace_id: String,
    /// Activity label
    pub activity: String,
    /// Time of the event
    pub timestamp: DateTime<FixedOffset>,
    /// Object the event was attributed to (if any)
    pub object_id: Option<String>,
}

impl FlatLogRow {
    /// Create a new row
    pub fn new<C: Into<String>, A: Into<String>>(
        trace_id: C,
        activity: A,
        timestamp: DateTime<FixedOffset>,
        object_id: Option<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            activity: activity.into(),
            timestamp,
            object_id,
        }
    }
}

/// Flat (case-centric) event log: a sequence of rows, each belonging to one trace
///
/// Used as input for DCR miners ([`crate::discovery::case_centric::dcr::DcrMiner`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatEventLog {
    /// Rows of the log
    pub rows: Vec<FlatLogRow>,
}

impl FlatEventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row
    pub fn push(&mut self, row: FlatLogRow) {
        self.rows.push(row);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the log has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All distinct activities
    pub fn activities(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.activity.as_str()).collect()
    }

    /// Rows grouped by trace id (in order of first appearance), each trace stable-sorted by timestamp
    pub fn traces(&self) -> Vec<(&str, Vec<&FlatLogRow>)> {
        let mut trace_index: HashMap<&str, usize> = HashMap::new();
        let mut traces: Vec<(&str, Vec<&FlatLogRow>)> = Vec::new();
        for row in &self.rows {
            let index = *trace_index.entry(row.trace_id.as_str()).or_insert_with(|| {
                traces.push((row.trace_id.as_str(), Vec::new()));
                traces.len() - 1
            });
            traces[index].1.push(row);
        }
        for (_, rows) in traces.iter_mut() {
            rows.sort_by_key(|r| r.timestamp);
        }
        traces
    }

    /// Sort all rows by `(trace_id, timestamp, object_id)`
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            (&a.trace_id, a.timestamp, &a.object_id).cmp(&(&b.trace_id, b.timestamp, &b.object_id))
        });
    }
}

impl FromIterator<FlatLogRow> for FlatEventLog {
    fn from_iter<T: IntoIterator<Item = FlatLogRow>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
