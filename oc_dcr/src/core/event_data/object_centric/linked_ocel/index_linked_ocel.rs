use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::event_data::object_centric::ocel_struct::{OCELEvent, OCELObject, OCEL};

use super::LinkedOCELAccess;

/// Position of an event in the (time-sorted) events of an [`IndexLinkedOCEL`]
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct EventIndex(usize);

impl EventIndex {
    /// Position as `usize`
    pub fn into_inner(self) -> usize {
        self.0
    }
}

/// Position of an object in an [`IndexLinkedOCEL`]
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ObjectIndex(usize);

impl ObjectIndex {
    /// Position as `usize`
    pub fn into_inner(self) -> usize {
        self.0
    }
}

/// An [`OCEL`] with E2O relations resolved to indices
///
/// Events are sorted by time (stable) on construction, so every event sequence handed out is in
/// time order and a smaller [`EventIndex`] never belongs to a later event. Relationships to
/// unknown object IDs are dropped. Activities and object types are only listed if they occur.
#[derive(Debug, Clone)]
pub struct IndexLinkedOCEL {
    ocel: OCEL,
    object_index: HashMap<String, ObjectIndex>,
    events_of_activity: BTreeMap<String, Vec<EventIndex>>,
    objects_of_type: BTreeMap<String, Vec<ObjectIndex>>,
    event_objects: Vec<Vec<(String, ObjectIndex)>>,
    distinct_event_objects: Vec<HashSet<ObjectIndex>>,
    object_events: Vec<Vec<(String, EventIndex)>>,
    all_events: Vec<EventIndex>,
    all_objects: Vec<ObjectIndex>,
}

impl IndexLinkedOCEL {
    /// Link an [`OCEL`] (taking ownership)
    pub fn from_ocel(ocel: OCEL) -> Self {
        Self::from(ocel)
    }

    /// The underlying (time-sorted) [`OCEL`]
    pub fn ocel(&self) -> &OCEL {
        &self.ocel
    }

    /// Number of objects
    pub fn num_objects(&self) -> usize {
        self.all_objects.len()
    }

    /// Distinct objects of an event
    pub fn get_e2o_set(&self, ev: &EventIndex) -> &HashSet<ObjectIndex> {
        &self.distinct_event_objects[ev.0]
    }
}

impl From<OCEL> for IndexLinkedOCEL {
    fn from(mut ocel: OCEL) -> Self {
        ocel.events.sort_by_key(|e| e.time);

        let mut object_index = HashMap::with_capacity(ocel.objects.len());
        let mut objects_of_type: BTreeMap<String, Vec<ObjectIndex>> = BTreeMap::new();
        for (i, ob) in ocel.objects.iter().enumerate() {
            object_index.insert(ob.id.clone(), ObjectIndex(i));
            objects_of_type
                .entry(ob.object_type.clone())
                .or_default()
                .push(ObjectIndex(i));
        }

        let mut events_of_activity: BTreeMap<String, Vec<EventIndex>> = BTreeMap::new();
        let mut event_objects = Vec::with_capacity(ocel.events.len());
        let mut object_events: Vec<Vec<(String, EventIndex)>> = vec![Vec::new(); ocel.objects.len()];
        for (i, ev) in ocel.events.iter().enumerate() {
            events_of_activity
                .entry(ev.event_type.clone())
                .or_default()
                .push(EventIndex(i));
            let mut objects = Vec::with_capacity(ev.relationships.len());
            for rel in &ev.relationships {
                match object_index.get(&rel.object_id) {
                    Some(ob) => {
                        object_events[ob.0].push((rel.qualifier.clone(), EventIndex(i)));
                        objects.push((rel.qualifier.clone(), *ob));
                    }
                    None => tracing::debug!(
                        "Event '{}' refers to unknown object '{}'",
                        ev.id,
                        rel.object_id
                    ),
                }
            }
            event_objects.push(objects);
        }
        let distinct_event_objects = event_objects
            .iter()
            .map(|objects| objects.iter().map(|(_, ob)| *ob).collect())
            .collect();

        Self {
            all_events: (0..ocel.events.len()).map(EventIndex).collect(),
            all_objects: (0..ocel.objects.len()).map(ObjectIndex).collect(),
            ocel,
            object_index,
            events_of_activity,
            objects_of_type,
            event_objects,
            distinct_event_objects,
            object_events,
        }
    }
}

impl<'a> LinkedOCELAccess<'a> for IndexLinkedOCEL {
    type EventRepr = EventIndex;
    type ObjectRepr = ObjectIndex;

    fn get_ev(&'a self, ev: &EventIndex) -> &'a OCELEvent {
        &self.ocel.events[ev.0]
    }

    fn get_ob(&'a self, ob: &ObjectIndex) -> &'a OCELObject {
        &self.ocel.objects[ob.0]
    }

    fn get_all_evs_ref(&'a self) -> impl Iterator<Item = &'a EventIndex> {
        self.all_events.iter()
    }

    fn get_all_obs_ref(&'a self) -> impl Iterator<Item = &'a ObjectIndex> {
        self.all_objects.iter()
    }

    fn get_ev_types(&'a self) -> impl Iterator<Item = &'a str> {
        self.events_of_activity.keys().map(String::as_str)
    }

    fn get_ob_types(&'a self) -> impl Iterator<Item = &'a str> {
        self.objects_of_type.keys().map(String::as_str)
    }

    fn get_evs_of_type(&'a self, ev_type: &'_ str) -> impl Iterator<Item = &'a EventIndex> {
        self.events_of_activity.get(ev_type).into_iter().flatten()
    }

    fn get_obs_of_type(&'a self, ob_type: &'_ str) -> impl Iterator<Item = &'a ObjectIndex> {
        self.objects_of_type.get(ob_type).into_iter().flatten()
    }

    fn get_e2o(&'a self, ev: &EventIndex) -> impl Iterator<Item = (&'a str, &'a ObjectIndex)> {
        self.event_objects[ev.0].iter().map(|(q, ob)| (q.as_str(), ob))
    }

    fn get_e2o_rev(&'a self, ob: &ObjectIndex) -> impl Iterator<Item = (&'a str, &'a EventIndex)> {
        self.object_events[ob.0].iter().map(|(q, ev)| (q.as_str(), ev))
    }

    fn get_ob_by_id(&'a self, ob_id: &'_ str) -> Option<ObjectIndex> {
        self.object_index.get(ob_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_data::object_centric::OCELRelationship;

    #[test]
    fn test_linking() {
        let locel = IndexLinkedOCEL::from_ocel(crate::ocel![
            events:
            ("Create Order", ["Order:1"]),
            ("Add Item", ["Item:1"]),
            ("Link Item to Order", ["Order:1", "Item:1"]),
            ("Ship Order", ["Order:1"]),
        ]);
        let order = locel.get_ob_by_id("Order:1").unwrap();
        assert_eq!(locel.get_ob_type_of(&order), "Order");
        let order_trace: Vec<&str> = locel
            .get_e2o_rev(&order)
            .map(|(_, ev)| locel.get_ev_type_of(ev))
            .collect();
        assert_eq!(
            order_trace,
            vec!["Create Order", "Link Item to Order", "Ship Order"]
        );

        let link = locel.get_evs_of_type("Link Item to Order").next().unwrap();
        assert_eq!(locel.get_e2o(link).count(), 2);
        assert_eq!(locel.get_e2o_set(link).len(), 2);
        assert_eq!(locel.get_obs_of_type("Item").count(), 1);
        assert_eq!(locel.get_ev_types().count(), 4);
        assert_eq!(locel.num_objects(), 2);
        assert!(locel.get_ob_by_id("Item:2").is_none());
    }

    #[test]
    fn test_events_sorted_and_unknown_objects_dropped() {
        let mut ocel = crate::ocel![
            events:
            ("A", ["o:1"]),
            ("B", ["o:1"]),
        ];
        ocel.events.reverse();
        ocel.events[0]
            .relationships
            .push(OCELRelationship::new("o:404", ""));
        let locel = IndexLinkedOCEL::from_ocel(ocel);
        let o = locel.get_ob_by_id("o:1").unwrap();
        let trace: Vec<&str> = locel
            .get_e2o_rev(&o)
            .map(|(_, ev)| locel.get_ev_type_of(ev))
            .collect();
        assert_eq!(trace, vec!["A", "B"]);
        assert!(locel
            .get_all_evs_ref()
            .all(|ev| locel.get_e2o(ev).count() == 1));
    }
}
