use std::collections::{BTreeSet, HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::dcr_struct::endpoint_labels;
use super::{
    DcrGraph, DcrGraphError, Event, EventRef, MarkingType, Relation, RelationKey, RelationType,
};

/// Where an event of an [`OcDcrGraph`] lives
#[derive(
    Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, JsonSchema,
)]
pub enum EventLocation {
    /// Top-level graph
    TopLevel,
    /// Subgraph of the object with the given type
    Object(String),
}

/// Correlation of an event: the top-level graph or the object holding it
#[derive(Debug, Clone, Copy)]
pub enum Correlation<'a> {
    /// Top-level graph
    TopLevel,
    /// Object subgraph
    Object(&'a OcDcrObject),
}

/// Object of an [`OcDcrGraph`]: a DCR subgraph describing the behavior of one object type
///
/// Objects with a spawn event are instantiated (spawned) by that top-level event, which enables
/// quantified (many-to-many) relations inside the subgraph. Relations of unspawned objects
/// never carry quantifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcDcrObject {
    spawn: Option<Event>,
    object_type: String,
    graph: DcrGraph,
}

impl OcDcrObject {
    /// Create an object from its spawn event, type and subgraph
    pub fn new<T: Into<String>>(spawn: Option<Event>, object_type: T, graph: DcrGraph) -> Self {
        Self {
            spawn,
            object_type: object_type.into(),
            graph,
        }
    }

    /// Spawn event (if the object type is spawned)
    pub fn spawn(&self) -> Option<&Event> {
        self.spawn.as_ref()
    }

    /// Whether this object has a spawn event
    pub fn is_spawned(&self) -> bool {
        self.spawn.is_some()
    }

    /// Object type
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Subgraph of this object
    pub fn graph(&self) -> &DcrGraph {
        &self.graph
    }

    /// Mutable subgraph of this object
    ///
    /// Relations added here bypass the quantifier check of [`OcDcrObject::add_relation`].
    pub fn graph_mut(&mut self) -> &mut DcrGraph {
        &mut self.graph
    }

    /// Add a relation with quantifiers, updating the quantifiers of an existing one
    ///
    /// For unspawned objects both quantifiers are always set to false.
    pub fn add_relation<'a, S, T>(
        &mut self,
        start: S,
        target: T,
        relation_type: RelationType,
        quantifier_head: bool,
        quantifier_tail: bool,
    ) -> Result<(), DcrGraphError>
    where
        S: Into<EventRef<'a>>,
        T: Into<EventRef<'a>>,
    {
        let spawned = self.is_spawned();
        self.graph.add_quantified_relation(
            start,
            target,
            relation_type,
            quantifier_head && spawned,
            quantifier_tail && spawned,
        )
    }

    /// Convert to a plain [`DcrGraph`], dropping all quantifiers
    pub fn to_dcr(&self) -> DcrGraph {
        let mut graph = self.graph.clone();
        let relations: Vec<Relation> = self
            .graph
            .relations()
            .map(|r| Relation::new(r.start.clone(), r.target.clone(), r.relation_type))
            .collect();
        graph.set_relations(relations);
        graph
    }
}

/// Object-Centric DCR graph
///
/// Consists of a top-level DCR graph, one [`OcDcrObject`] per object type, spawn relations
/// (spawn event to object type) and synchronizing relations between events of different
/// objects. Every event label is unique across all layers and indexed by its [`EventLocation`].
///
/// The top-level relation layer may also hold one-to-many relations connecting a top-level event
/// with an event of an object subgraph.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcDcrGraph {
    top_level: DcrGraph,
    objects: HashMap<String, OcDcrObject>,
    spawn_relations: HashMap<Event, String>,
    #[serde_as(as = "Vec<(_, _)>")]
    sync_relations: HashMap<RelationKey, Relation>,
    activity_to_object: HashMap<Event, EventLocation>,
}

impl OcDcrGraph {
    /// Create an empty [`OcDcrGraph`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an (included) event to the top level or to the object of the given type
    pub fn add_event<T: Into<String>>(
        &mut self,
        activity: T,
        object: Option<&str>,
    ) -> Result<Event, DcrGraphError> {
        self.add_event_with_marking(activity, [MarkingType::Included], None, object)
    }

    /// Add an event with marking and optional parent group to the top level or to an object
    ///
    /// Fails if the label is already used anywhere in the graph, if the object type is unknown
    /// or if the parent group lives in another layer.
    pub fn add_event_with_marking<T, M>(
        &mut self,
        activity: T,
        marking: M,
        parent: Option<&str>,
        object: Option<&str>,
    ) -> Result<Event, DcrGraphError>
    where
        T: Into<String>,
        M: IntoIterator<Item = MarkingType>,
    {
        let activity: String = activity.into();
        if self.contains_event(&activity) {
            return Err(DcrGraphError::EventAlreadyExists(activity));
        }
        let location = match object {
            Some(t) if self.objects.contains_key(t) => EventLocation::Object(t.to_string()),
            Some(t) => return Err(DcrGraphError::UnknownObject(t.to_string())),
            None => EventLocation::TopLevel,
        };
        if let Some(parent) = parent {
            if let Some(parent_location) = self.activity_to_object.get(parent) {
                if parent_location != &location {
                    return Err(DcrGraphError::InvalidNesting {
                        group: parent.to_string(),
                        child: activity,
                    });
                }
            }
        }
        let graph = match &location {
            EventLocation::TopLevel => &mut self.top_level,
            EventLocation::Object(t) => match self.objects.get_mut(t) {
                Some(o) => &mut o.graph,
                None => return Err(DcrGraphError::UnknownObject(t.clone())),
            },
        };
        let event = graph.add_event_with_marking(activity, marking, parent)?;
        if let Some(parent) = parent {
            self.activity_to_object
                .insert(Event::new(parent), location.clone());
        }
        self.activity_to_object.insert(event.clone(), location);
        Ok(event)
    }

    /// Add an object (replacing an object of the same type)
    ///
    /// The spawn event of the object is added to the top level if it does not exist yet.
    pub fn add_object(&mut self, object: OcDcrObject) {
        self.spawn_relations
            .retain(|_, object_type| *object_type != object.object_type);
        if let Some(spawn) = object.spawn.clone() {
            self.spawn_relations
                .insert(spawn.clone(), object.object_type.clone());
            if !self.top_level.contains_event(spawn.as_str()) {
                self.top_level.add_event(spawn.as_str());
            }
        }
        self.objects.insert(object.object_type.clone(), object);
        self.update_activities();
    }

    /// Recompute the event location index from all layers
    ///
    /// Required after modifying an object through [`OcDcrGraph::object_mut`].
    pub fn update_activities(&mut self) {
        self.activity_to_object.clear();
        for e in self.top_level.events() {
            self.activity_to_object
                .insert(e.clone(), EventLocation::TopLevel);
        }
        for (object_type, object) in &self.objects {
            for e in object.graph.events() {
                self.activity_to_object
                    .insert(e.clone(), EventLocation::Object(object_type.clone()));
            }
        }
    }

    /// Location of an event
    pub fn location_of(&self, activity: &str) -> Option<&EventLocation> {
        self.activity_to_object.get(activity)
    }

    /// Whether an event with that label exists in any layer
    pub fn contains_event(&self, activity: &str) -> bool {
        self.activity_to_object.contains_key(activity)
    }

    /// Get an event by label from any layer
    pub fn get_event(&self, activity: &str) -> Option<&Event> {
        self.activity_to_object
            .get_key_value(activity)
            .map(|(e, _)| e)
    }

    /// All events of all layers
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.activity_to_object.keys()
    }

    /// Add a relation, routing it to the layer it belongs to
    ///
    /// An existing relation (in any layer) only gets its quantifiers updated. Otherwise, relations
    /// between two top-level events go to the top level, relations inside one object go to that
    /// object and all others become synchronizing relations.
    pub fn add_relation<'a, S, T>(
        &mut self,
        start: S,
        target: T,
        relation_type: RelationType,
        quantifier_head: bool,
        quantifier_tail: bool,
    ) -> Result<(), DcrGraphError>
    where
        S: Into<EventRef<'a>>,
        T: Into<EventRef<'a>>,
    {
        let (start, target) = endpoint_labels(start.into(), target.into())?;
        let start_location = self
            .location_of(start)
            .cloned()
            .ok_or_else(|| DcrGraphError::EventNotFound(start.to_string()))?;
        let target_location = self
            .location_of(target)
            .cloned()
            .ok_or_else(|| DcrGraphError::EventNotFound(target.to_string()))?;
        let key = (Event::new(start), Event::new(target), relation_type);

        if let Some(rel) = self.top_level.relation_mut(&key) {
            rel.quantifier_head = quantifier_head;
            rel.quantifier_tail = quantifier_tail;
            return Ok(());
        }
        if let Some(rel) = self.sync_relations.get_mut(&key) {
            rel.quantifier_head = quantifier_head;
            rel.quantifier_tail = quantifier_tail;
            return Ok(());
        }
        if let Some(object) = self
            .objects
            .values_mut()
            .find(|o| o.graph.get_relation(start, target, relation_type).is_some())
        {
            return object.add_relation(start, target, relation_type, quantifier_head, quantifier_tail);
        }

        match (start_location, target_location) {
            (EventLocation::TopLevel, EventLocation::TopLevel) => {
                self.top_level.insert_relation(Relation::with_quantifiers(
                    key.0,
                    key.1,
                    relation_type,
                    quantifier_head,
                    quantifier_tail,
                ));
                Ok(())
            }
            (EventLocation::Object(s), EventLocation::Object(t)) if s == t => self
                .objects
                .get_mut(&s)
                .ok_or(DcrGraphError::UnknownObject(s.clone()))?
                .add_relation(start, target, relation_type, quantifier_head, quantifier_tail),
            _ => {
                self.sync_relations.insert(
                    key.clone(),
                    Relation::with_quantifiers(
                        key.0,
                        key.1,
                        relation_type,
                        quantifier_head,
                        quantifier_tail,
                    ),
                );
                Ok(())
            }
        }
    }

    /// Insert a relation into the top-level layer without routing
    ///
    /// Either endpoint may live in an object subgraph (one-to-many relations).
    pub(crate) fn insert_top_level_relation(&mut self, relation: Relation) {
        self.top_level.insert_relation(relation);
    }

    /// Get a relation from any layer
    pub fn get_relation(
        &self,
        start: &str,
        target: &str,
        relation_type: RelationType,
    ) -> Option<&Relation> {
        self.top_level
            .get_relation(start, target, relation_type)
            .or_else(|| {
                self.sync_relations
                    .get(&(Event::new(start), Event::new(target), relation_type))
            })
            .or_else(|| {
                self.objects
                    .values()
                    .find_map(|o| o.graph.get_relation(start, target, relation_type))
            })
    }

    /// All relations of all layers (top level, synchronizing and object relations)
    pub fn get_all_relations(&self) -> impl Iterator<Item = &Relation> {
        self.top_level
            .relations()
            .chain(self.sync_relations.values())
            .chain(self.objects.values().flat_map(|o| o.graph.relations()))
    }

    /// All relations of all layers touching the given event, sorted
    pub fn get_incidental_relations(&self, event: &str) -> Result<Vec<Relation>, DcrGraphError> {
        if !self.contains_event(event) {
            return Err(DcrGraphError::EventNotFound(event.to_string()));
        }
        let rels: BTreeSet<Relation> = self
            .get_all_relations()
            .filter(|r| r.touches(event))
            .cloned()
            .collect();
        Ok(rels.into_iter().collect())
    }

    /// Remove a relation from whichever layer holds it
    pub fn remove_relation(&mut self, relation: &Relation) -> bool {
        if self.top_level.remove_relation(relation) {
            return true;
        }
        if self.sync_relations.remove(&relation.key()).is_some() {
            return true;
        }
        self.objects
            .values_mut()
            .any(|o| o.graph.remove_relation(relation))
    }

    /// Remove an event and all relations touching it
    ///
    /// Spawn events can not be removed.
    pub fn remove_event(&mut self, event: &str) -> Result<Event, DcrGraphError> {
        if self.spawn_relations.contains_key(event) {
            return Err(DcrGraphError::CannotRemoveSpawn(event.to_string()));
        }
        let location = self
            .location_of(event)
            .cloned()
            .ok_or_else(|| DcrGraphError::EventNotFound(event.to_string()))?;
        let graph = match &location {
            EventLocation::TopLevel => &mut self.top_level,
            EventLocation::Object(t) => match self.objects.get_mut(t) {
                Some(o) => &mut o.graph,
                None => return Err(DcrGraphError::UnknownObject(t.clone())),
            },
        };
        let removed = graph.remove_event(event)?;
        self.top_level.retain_relations(|r| !r.touches(event));
        self.sync_relations.retain(|_, r| !r.touches(event));
        for object in self.objects.values_mut() {
            object.graph.retain_relations(|r| !r.touches(event));
        }
        self.activity_to_object.remove(event);
        Ok(removed)
    }

    /// Correlation of an event: the top level or the object containing it
    pub fn corr(&self, event: &str) -> Result<Correlation<'_>, DcrGraphError> {
        match self.location_of(event) {
            None => Err(DcrGraphError::EventNotFound(event.to_string())),
            Some(EventLocation::TopLevel) => Ok(Correlation::TopLevel),
            Some(EventLocation::Object(t)) => self
                .objects
                .get(t)
                .map(Correlation::Object)
                .ok_or_else(|| DcrGraphError::UnknownObject(t.clone())),
        }
    }

    /// Spawn event of the object containing the event (None for top-level events and
    /// unspawned objects)
    pub fn spawn_of(&self, event: &str) -> Result<Option<&Event>, DcrGraphError> {
        Ok(match self.corr(event)? {
            Correlation::TopLevel => None,
            Correlation::Object(o) => o.spawn(),
        })
    }

    /// Add relations as many-to-many relations where both endpoints belong to spawned objects
    ///
    /// Relations with an endpoint on the top level or in an unspawned object are skipped.
    /// All endpoints are checked before any relation is added.
    pub fn partition<I: IntoIterator<Item = Relation>>(
        &mut self,
        relations: I,
    ) -> Result<(), DcrGraphError> {
        let relations: Vec<Relation> = relations.into_iter().collect();
        for r in &relations {
            for e in [&r.start, &r.target] {
                if !self.contains_event(e.as_str()) {
                    return Err(DcrGraphError::EventNotFound(e.to_string()));
                }
            }
        }
        for r in relations {
            let both_spawned = self.spawn_of(r.start.as_str())?.is_some()
                && self.spawn_of(r.target.as_str())?.is_some();
            if both_spawned {
                self.add_relation(&r.start, &r.target, r.relation_type, true, true)?;
            }
        }
        Ok(())
    }

    /// Move top-level events into a new object of the given type without spawn event
    ///
    /// Markings are preserved and all relations touching the moved events are re-added
    /// (and thereby re-routed).
    pub fn group_top_level_events_into_unspawned_object<I, S>(
        &mut self,
        events: I,
        object_type: &str,
    ) -> Result<(), DcrGraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: BTreeSet<String> = events
            .into_iter()
            .map(|e| e.as_ref().to_string())
            .collect();
        for label in &labels {
            if self.location_of(label) != Some(&EventLocation::TopLevel)
                || self.spawn_relations.contains_key(label.as_str())
            {
                return Err(DcrGraphError::NotTopLevel(label.clone()));
            }
        }
        if self.spawn_relations.values().any(|t| t == object_type) {
            return Err(DcrGraphError::AlreadySpawned(object_type.to_string()));
        }
        if self.objects.contains_key(object_type) {
            return Err(DcrGraphError::ObjectTypeExists(object_type.to_string()));
        }

        let mut relations: BTreeSet<Relation> = BTreeSet::new();
        let mut markings: Vec<(String, HashSet<MarkingType>)> = Vec::new();
        for label in &labels {
            relations.extend(self.get_incidental_relations(label)?);
            markings.push((label.clone(), self.top_level.event_marking(label)));
        }
        for label in &labels {
            self.remove_event(label)?;
        }
        self.add_object(OcDcrObject::new(None, object_type, DcrGraph::new()));
        for (label, marking) in markings {
            self.add_event_with_marking(label, marking, None, Some(object_type))?;
        }
        for r in relations {
            self.add_relation(
                &r.start,
                &r.target,
                r.relation_type,
                r.quantifier_head,
                r.quantifier_tail,
            )?;
        }
        Ok(())
    }

    /// Top-level graph
    pub fn top_level(&self) -> &DcrGraph {
        &self.top_level
    }

    pub(crate) fn top_level_mut(&mut self) -> &mut DcrGraph {
        &mut self.top_level
    }

    /// All objects by type
    pub fn objects(&self) -> &HashMap<String, OcDcrObject> {
        &self.objects
    }

    /// Object of the given type
    pub fn object(&self, object_type: &str) -> Option<&OcDcrObject> {
        self.objects.get(object_type)
    }

    /// Mutable object of the given type
    ///
    /// Call [`OcDcrGraph::update_activities`] after adding or removing events.
    pub fn object_mut(&mut self, object_type: &str) -> Option<&mut OcDcrObject> {
        self.objects.get_mut(object_type)
    }

    /// Spawn relations: spawn event to spawned object type
    pub fn spawn_relations(&self) -> &HashMap<Event, String> {
        &self.spawn_relations
    }

    /// Synchronizing relations between objects
    pub fn sync_relations(&self) -> impl Iterator<Item = &Relation> {
        self.sync_relations.values()
    }

    pub(crate) fn retain_sync_relations<F: FnMut(&Relation) -> bool>(&mut self, mut f: F) {
        self.sync_relations.retain(|_, r| f(r));
    }

    pub(crate) fn set_sync_relations<I: IntoIterator<Item = Relation>>(&mut self, relations: I) {
        self.sync_relations = relations.into_iter().map(|r| (r.key(), r)).collect();
    }

    /// Event location index
    pub fn activity_to_object(&self) -> &HashMap<Event, EventLocation> {
        &self.activity_to_object
    }
}
