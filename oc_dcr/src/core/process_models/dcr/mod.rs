//! DCR graphs and Object-Centric DCR graphs
//!
//! Plain [`DcrGraph`]s hold events, typed relations, a marking and nested groups.
//! [`OcDcrGraph`]s add a layer of object subgraphs ([`OcDcrObject`]), spawn events and
//! synchronizing relations between objects.
pub(crate) mod dcr_struct;
pub use dcr_struct::*;
pub(crate) mod oc_dcr_struct;
pub use oc_dcr_struct::*;
/// Template (dictionary) interchange form of DCR and OC-DCR graphs
pub mod template;
/// Filtering relations of (OC-)DCR graphs by type and quantifiers
pub mod filtering;

/// Errors raised by (OC-)DCR graph operations
///
/// All operations check their preconditions first, so a graph is never left partially modified
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DcrGraphError {
    /// No event with the given label exists
    #[error("event '{0}' not found in graph")]
    EventNotFound(String),
    /// An event with the given label already exists somewhere in the graph
    #[error("event '{0}' already exists")]
    EventAlreadyExists(String),
    /// No object with the given type exists
    #[error("object type '{0}' is not part of this OC-DCR graph")]
    UnknownObject(String),
    /// Spawn events can not be removed
    #[error("cannot remove spawn event '{0}'")]
    CannotRemoveSpawn(String),
    /// The event is not a (non-spawn) event of the top-level graph
    #[error("event '{0}' is not a top-level event")]
    NotTopLevel(String),
    /// The object type already has a spawn event
    #[error("object type '{0}' is already spawned")]
    AlreadySpawned(String),
    /// An object of that type already exists
    #[error("object type '{0}' already exists")]
    ObjectTypeExists(String),
    /// Relation endpoints must either both be labels or both be events
    #[error("relation endpoints must both be labels or both be events")]
    TypeMismatch,
    /// A group can not (transitively) contain itself
    #[error("cannot nest '{child}' into '{group}'")]
    InvalidNesting {
        /// Group that should receive the child
        group: String,
        /// Child that is the group or one of its ancestors
        child: String,
    },
}
