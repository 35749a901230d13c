//! Event Data
//!
//! Object-centric event logs and the flat (case-centric) logs derived from them
pub mod case_centric;
pub mod object_centric;

#[doc(inline)]
pub use case_centric::FlatEventLog;
#[doc(inline)]
pub use object_centric::OCEL;
