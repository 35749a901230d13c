//! Object-Centric Process Discovery
pub mod oc_dcr;
