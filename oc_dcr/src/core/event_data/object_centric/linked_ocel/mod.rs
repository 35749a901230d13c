//! Linked views on [`OCEL`](crate::OCEL)s
//!
//! Discovery mostly walks event-to-object (E2O) relations in both directions: the events of an
//! object form its trace, the objects of an event link objects into closures.
use chrono::{DateTime, FixedOffset};

use super::ocel_struct::{OCELEvent, OCELObject};

pub mod index_linked_ocel;
pub use index_linked_ocel::{EventIndex, IndexLinkedOCEL, ObjectIndex};

/// Read access to the events, objects and E2O relations of a linked [`OCEL`](crate::OCEL)
///
/// Events and objects are referred to by an implementation-specific handle
/// ([`LinkedOCELAccess::EventRepr`], [`LinkedOCELAccess::ObjectRepr`]).
pub trait LinkedOCELAccess<'a> {
    /// Handle of an event
    type EventRepr: 'a;
    /// Handle of an object
    type ObjectRepr: 'a;

    /// Resolve an event handle
    fn get_ev(&'a self, ev: &Self::EventRepr) -> &'a OCELEvent;
    /// Resolve an object handle
    fn get_ob(&'a self, ob: &Self::ObjectRepr) -> &'a OCELObject;

    /// All event handles, in time order
    fn get_all_evs_ref(&'a self) -> impl Iterator<Item = &'a Self::EventRepr>;
    /// All object handles
    fn get_all_obs_ref(&'a self) -> impl Iterator<Item = &'a Self::ObjectRepr>;

    /// Activities with at least one event
    fn get_ev_types(&'a self) -> impl Iterator<Item = &'a str>;
    /// Object types with at least one object
    fn get_ob_types(&'a self) -> impl Iterator<Item = &'a str>;

    /// Events of an activity, in time order
    fn get_evs_of_type(&'a self, ev_type: &'_ str) -> impl Iterator<Item = &'a Self::EventRepr>;
    /// Objects of an object type
    fn get_obs_of_type(&'a self, ob_type: &'_ str) -> impl Iterator<Item = &'a Self::ObjectRepr>;

    /// Qualified objects of an event
    fn get_e2o(
        &'a self,
        ev: &Self::EventRepr,
    ) -> impl Iterator<Item = (&'a str, &'a Self::ObjectRepr)>;
    /// Qualified events of an object, in time order
    fn get_e2o_rev(
        &'a self,
        ob: &Self::ObjectRepr,
    ) -> impl Iterator<Item = (&'a str, &'a Self::EventRepr)>;

    /// Look up an object by its ID
    fn get_ob_by_id(&'a self, ob_id: &'_ str) -> Option<Self::ObjectRepr>;

    /// Activity of an event
    fn get_ev_type_of(&'a self, ev: &Self::EventRepr) -> &'a str {
        &self.get_ev(ev).event_type
    }
    /// Timestamp of an event
    fn get_ev_time(&'a self, ev: &Self::EventRepr) -> &'a DateTime<FixedOffset> {
        &self.get_ev(ev).time
    }
    /// Type of an object
    fn get_ob_type_of(&'a self, ob: &Self::ObjectRepr) -> &'a str {
        &self.get_ob(ob).object_type
    }
    /// ID of an object
    fn get_ob_id(&'a self, ob: &Self::ObjectRepr) -> &'a str {
        &self.get_ob(ob).id
    }
}
