//! Object-Centric Event Data
pub mod linked_ocel;
/// [`ocel!`](crate::ocel) macro for small inline logs
pub mod macros;
pub mod ocel_struct;

pub use ocel_struct::*;
