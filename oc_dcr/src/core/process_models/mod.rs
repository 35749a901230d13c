//! Process Models
//!
//! Declarative DCR graphs and their object-centric extension
pub mod dcr;
