//! Core modules for object-centric DCR graphs

pub use chrono;
pub mod event_data;

pub mod process_models;

pub use event_data::case_centric::FlatEventLog;
pub use event_data::object_centric::linked_ocel::IndexLinkedOCEL;
pub use event_data::object_centric::OCEL;
pub use process_models::dcr::{DcrGraph, OcDcrGraph};
