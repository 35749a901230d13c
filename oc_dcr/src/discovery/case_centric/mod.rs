//! Case-Centric Process Discovery
pub mod dcr;
