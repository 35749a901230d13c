/// Activity projection of flat event logs
pub mod activity_projection;
/// [`FlatEventLog`] struct
pub mod flat_log;

pub use activity_projection::EventLogActivityProjection;
pub use flat_log::{FlatEventLog, FlatLogRow};
