//! Convenient Macros for Creating Object-centric Event Data
/// Creates an [`OCEL`] containing the given events, objects and event-to-object (e2o) relations.
///
/// Each event is a tuple that contains as first entry the event type and as second entry the
/// related objects as a list of object identifiers. Object identifiers have to be
/// denoted '`ob_type`':'`ob_id`'; the part before the first colon is used as object type.
/// Optionally, object-to-object (o2o) relations can be listed after the events.
///
/// Events get the IDs `ev:1`, `ev:2`, ... and timestamps one second apart, starting at
/// 2020-01-01 00:00:00 UTC.
///
/// ```
/// use oc_dcr::ocel;
///
/// let log = ocel![
///     events:
///     ("Create Order", ["Order:1"]),
///     ("Add Item", ["Item:1"]),
///     ("Link Item to Order", ["Order:1", "Item:1"]),
///     o2o:
///     ("Order:1", "Item:1")
/// ];
/// assert_eq!(log.events.len(), 3);
/// assert_eq!(log.objects.len(), 2);
/// ```
///
/// [`OCEL`]: crate::core::event_data::object_centric::OCEL
#[macro_export]
macro_rules! ocel {
    (events: $(($ev_type:expr, [$($object:expr),* $(,)?])),* $(,)?) => {
        $crate::ocel!(events: $(($ev_type, [$($object),*])),*, o2o:)
    };
    (events: $(($ev_type:expr, [$($object:expr),* $(,)?])),*, o2o: $(($from_ob:expr, $to_ob:expr)),* $(,)?) => {{
        use ::std::collections::{BTreeMap, BTreeSet};
        use $crate::core::chrono::{TimeDelta, TimeZone, Utc};
        use $crate::core::event_data::object_centric::{
            OCELEvent, OCELObject, OCELRelationship, OCELType, OCEL,
        };

        fn object_type_of(object_id: &str) -> String {
            object_id.split(':').next().unwrap_or(object_id).to_string()
        }

        let mut event_types_set: BTreeSet<String> = BTreeSet::new();
        let mut object_types_set: BTreeSet<String> = BTreeSet::new();
        let mut objects: BTreeMap<String, OCELObject> = BTreeMap::new();
        let mut events = Vec::new();

        let mut timestamp = Utc
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .unwrap()
            .fixed_offset();
        #[allow(unused_mut)]
        let mut ev_counter = 0;
        $(
            event_types_set.insert($ev_type.to_string());
            #[allow(unused_mut)]
            let mut relations: Vec<OCELRelationship> = Vec::new();
            $(
                let object_id = $object.to_string();
                let object_type = object_type_of(&object_id);
                relations.push(OCELRelationship::new(object_id.clone(), object_type.clone()));
                object_types_set.insert(object_type.clone());
                objects.entry(object_id.clone()).or_insert_with(|| OCELObject {
                    id: object_id,
                    object_type,
                    attributes: Vec::new(),
                    relationships: Vec::new(),
                });
            )*
            ev_counter += 1;
            events.push(OCELEvent::new(
                format!("ev:{}", ev_counter),
                $ev_type.to_string(),
                timestamp,
                Vec::new(),
                relations,
            ));
            timestamp += TimeDelta::seconds(1);
        )*

        $(
            let from_id = $from_ob.to_string();
            let to_id = $to_ob.to_string();
            let o2o = OCELRelationship::new(to_id.clone(), object_type_of(&to_id));
            let from_type = object_type_of(&from_id);
            object_types_set.insert(from_type.clone());
            objects
                .entry(from_id.clone())
                .or_insert_with(|| OCELObject {
                    id: from_id,
                    object_type: from_type,
                    attributes: Vec::new(),
                    relationships: Vec::new(),
                })
                .relationships
                .push(o2o);
        )*

        OCEL {
            event_types: event_types_set.into_iter().map(OCELType::new).collect(),
            object_types: object_types_set.into_iter().map(OCELType::new).collect(),
            events,
            objects: objects.into_values().collect(),
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_ocel_macro() {
        let log = ocel![
            events:
            ("Create Order", ["Order:1"]),
            ("Add Item", ["Item:1"]),
            ("Link Item to Order", ["Order:1", "Item:1"]),
        ];
        assert_eq!(log.events.len(), 3);
        assert_eq!(log.event_types.len(), 3);
        assert_eq!(log.object_types.len(), 2);
        assert_eq!(log.objects.len(), 2);
        assert_eq!(log.events[2].id, "ev:3");
        assert_eq!(log.events[2].relationships.len(), 2);
        assert_eq!(
            (log.events[1].time - log.events[0].time).num_seconds(),
            1
        );
    }

    #[test]
    fn test_ocel_macro_o2o() {
        let log = ocel![
            events:
            ("Create Order", ["Order:1"]),
            o2o:
            ("Order:1", "Item:1")
        ];
        let order = log.objects.iter().find(|o| o.id == "Order:1").unwrap();
        assert_eq!(order.relationships[0].object_id, "Item:1");
        assert_eq!(log.object_types.len(), 1);
    }
}
