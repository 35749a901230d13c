use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::DcrGraphError;

#[derive(
    Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, JsonSchema,
)]
/// DCR event (i.e., activity), identified by its label
///
/// Whether an event is a group and which group it belongs to is stored in the owning graph
/// (see [`DcrGraph::is_group`] and [`DcrGraph::parent_of`]).
pub struct Event(String);

impl Event {
    /// Create event from an activity label
    pub fn new<T: Into<String>>(activity: T) -> Self {
        Self(activity.into())
    }

    /// Return the activity label
    pub fn activity(&self) -> &str {
        self.0.as_str()
    }

    /// Return the activity label
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for Event {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Event {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Event {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// DCR relation (arrow) type
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, JsonSchema,
)]
pub enum RelationType {
    /// Executing the start event includes the target event
    Include,
    /// Executing the start event excludes the target event
    Exclude,
    /// Executing the start event makes the target event pending (it has to happen afterwards)
    Response,
    /// The target event can only execute after the (included) start event was executed
    Condition,
}

/// All DCR relation types
pub const ALL_RELATION_TYPES: &[RelationType] = &[
    RelationType::Include,
    RelationType::Exclude,
    RelationType::Response,
    RelationType::Condition,
];

impl RelationType {
    /// Name of the relation dictionary in the template interchange form
    pub fn template_key(&self) -> &'static str {
        match self {
            RelationType::Include => "includesTo",
            RelationType::Exclude => "excludesTo",
            RelationType::Response => "responseTo",
            RelationType::Condition => "conditionsFor",
        }
    }

    /// Parse from a template key (e.g., `conditionsFor`)
    pub fn from_template_key(key: &str) -> Option<Self> {
        ALL_RELATION_TYPES
            .iter()
            .find(|t| t.template_key() == key)
            .copied()
    }

    /// Whether relation dictionaries of this type are keyed by the target event
    ///
    /// Condition dictionaries map a target to the set of its conditions.
    pub fn is_target_keyed(&self) -> bool {
        matches!(self, RelationType::Condition)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationType::Include => "include",
            RelationType::Exclude => "exclude",
            RelationType::Response => "response",
            RelationType::Condition => "condition",
        };
        f.write_str(s)
    }
}

/// Lookup key of a relation: start, target and type
pub type RelationKey = (Event, Event, RelationType);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
/// Typed relation between two events, optionally quantified on either end
///
/// `quantifier_head` quantifies over the target side, `quantifier_tail` over the start side.
pub struct Relation {
    /// Start event
    pub start: Event,
    /// Target event
    pub target: Event,
    /// Relation type
    pub relation_type: RelationType,
    /// Universal quantifier on the target side
    pub quantifier_head: bool,
    /// Universal quantifier on the start side
    pub quantifier_tail: bool,
}

impl Relation {
    /// Create an unquantified (one-to-one) relation
    pub fn new(start: Event, target: Event, relation_type: RelationType) -> Self {
        Self::with_quantifiers(start, target, relation_type, false, false)
    }

    /// Create a relation with explicit quantifiers
    pub fn with_quantifiers(
        start: Event,
        target: Event,
        relation_type: RelationType,
        quantifier_head: bool,
        quantifier_tail: bool,
    ) -> Self {
        Self {
            start,
            target,
            relation_type,
            quantifier_head,
            quantifier_tail,
        }
    }

    /// Lookup key (start, target, type)
    pub fn key(&self) -> RelationKey {
        (self.start.clone(), self.target.clone(), self.relation_type)
    }

    /// Quantifiers as `(head, tail)`
    pub fn quantifiers(&self) -> (bool, bool) {
        (self.quantifier_head, self.quantifier_tail)
    }

    /// Both sides quantified
    pub fn is_many_to_many(&self) -> bool {
        self.quantifier_head && self.quantifier_tail
    }

    /// Exactly one side quantified
    pub fn is_one_to_many(&self) -> bool {
        self.quantifier_head != self.quantifier_tail
    }

    /// No side quantified
    pub fn is_one_to_one(&self) -> bool {
        !self.quantifier_head && !self.quantifier_tail
    }

    /// Whether the event is the start or target of this relation
    pub fn touches(&self, event: &str) -> bool {
        self.start.as_str() == event || self.target.as_str() == event
    }
}

/// Kind of marking an event can be in
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, JsonSchema,
)]
pub enum MarkingType {
    /// Event was executed
    Executed,
    /// Event is included
    Included,
    /// Event is pending
    Pending,
}

/// Marking of a DCR graph: sets of executed, included and pending events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Marking {
    /// Executed events
    pub executed: HashSet<Event>,
    /// Included events
    pub included: HashSet<Event>,
    /// Pending events
    pub pending: HashSet<Event>,
}

impl Marking {
    /// Get the set of events with the given marking type
    pub fn get_set(&self, marking_type: MarkingType) -> &HashSet<Event> {
        match marking_type {
            MarkingType::Executed => &self.executed,
            MarkingType::Included => &self.included,
            MarkingType::Pending => &self.pending,
        }
    }

    fn get_set_mut(&mut self, marking_type: MarkingType) -> &mut HashSet<Event> {
        match marking_type {
            MarkingType::Executed => &mut self.executed,
            MarkingType::Included => &mut self.included,
            MarkingType::Pending => &mut self.pending,
        }
    }

    /// Add an event to the set of the given marking type
    pub fn add_event(&mut self, event: Event, marking_type: MarkingType) {
        self.get_set_mut(marking_type).insert(event);
    }

    /// Remove an event from all marking sets
    ///
    /// Returns true if the event was contained in any of them.
    pub fn remove_event(&mut self, event: &str) -> bool {
        let executed = self.executed.remove(event);
        let included = self.included.remove(event);
        let pending = self.pending.remove(event);
        executed || included || pending
    }

    /// All marking types of an event
    pub fn get_event_marking(&self, event: &str) -> HashSet<MarkingType> {
        [
            MarkingType::Executed,
            MarkingType::Included,
            MarkingType::Pending,
        ]
        .into_iter()
        .filter(|t| self.get_set(*t).contains(event))
        .collect()
    }
}

/// Reference to an event, either by label or as an [`Event`]
///
/// Operations taking two endpoints require both to be of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRef<'a> {
    /// Activity label
    Label(&'a str),
    /// Event value
    Event(&'a Event),
}

impl<'a> EventRef<'a> {
    /// Label of the referenced event
    pub fn label(&self) -> &'a str {
        match self {
            EventRef::Label(l) => l,
            EventRef::Event(e) => e.as_str(),
        }
    }
}

impl<'a> From<&'a str> for EventRef<'a> {
    fn from(value: &'a str) -> Self {
        EventRef::Label(value)
    }
}

impl<'a> From<&'a String> for EventRef<'a> {
    fn from(value: &'a String) -> Self {
        EventRef::Label(value.as_str())
    }
}

impl<'a> From<&'a Event> for EventRef<'a> {
    fn from(value: &'a Event) -> Self {
        EventRef::Event(value)
    }
}

/// Check that both endpoints are of the same kind and return their labels
pub(crate) fn endpoint_labels<'a>(
    start: EventRef<'a>,
    target: EventRef<'a>,
) -> Result<(&'a str, &'a str), DcrGraphError> {
    match (start, target) {
        (EventRef::Label(s), EventRef::Label(t)) => Ok((s, t)),
        (EventRef::Event(s), EventRef::Event(t)) => Ok((s.as_str(), t.as_str())),
        _ => Err(DcrGraphError::TypeMismatch),
    }
}

/// A DCR graph
///
/// Consists of events, typed relations between them (at most one per start, target and type),
/// a [`Marking`] and nested groups. The group map (group to children) and the parent index
/// (child to group) are kept consistent by every mutating operation.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DcrGraph {
    events: HashSet<Event>,
    #[serde_as(as = "Vec<(_, _)>")]
    relations: HashMap<RelationKey, Relation>,
    marking: Marking,
    nested_groups: HashMap<Event, HashSet<Event>>,
    parents: HashMap<Event, Event>,
}

impl DcrGraph {
    /// Create an empty [`DcrGraph`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event with the default marking (included)
    ///
    /// If the event already exists, the existing one is returned.
    pub fn add_event<T: Into<String>>(&mut self, activity: T) -> Event {
        let event = Event::new(activity);
        self.register_event(event.clone(), [MarkingType::Included]);
        event
    }

    /// Add an event with the given marking, optionally as child of a parent group
    ///
    /// Adding an existing event adds the marking to it (and moves it to the given parent).
    /// A parent that does not exist yet is created as a group.
    pub fn add_event_with_marking<T, M>(
        &mut self,
        activity: T,
        marking: M,
        parent: Option<&str>,
    ) -> Result<Event, DcrGraphError>
    where
        T: Into<String>,
        M: IntoIterator<Item = MarkingType>,
    {
        let event = Event::new(activity);
        if let Some(parent) = parent {
            self.check_nesting(parent, event.as_str())?;
        }
        self.register_event(event.clone(), marking);
        if let Some(parent) = parent {
            let parent = self.add_group(parent);
            self.link_child(&parent, &event);
        }
        Ok(event)
    }

    /// Add a group event (included), keeping existing children if it is already a group
    pub fn add_group<T: Into<String>>(&mut self, activity: T) -> Event {
        let group = self.add_event(activity);
        self.nested_groups.entry(group.clone()).or_default();
        group
    }

    fn register_event<M: IntoIterator<Item = MarkingType>>(&mut self, event: Event, marking: M) {
        for m in marking {
            self.marking.add_event(event.clone(), m);
        }
        self.events.insert(event);
    }

    /// Fails if `child` is `group` or one of its ancestors
    fn check_nesting(&self, group: &str, child: &str) -> Result<(), DcrGraphError> {
        let mut current = Some(group);
        while let Some(c) = current {
            if c == child {
                return Err(DcrGraphError::InvalidNesting {
                    group: group.to_string(),
                    child: child.to_string(),
                });
            }
            current = self.parents.get(c).map(Event::as_str);
        }
        Ok(())
    }

    fn link_child(&mut self, group: &Event, child: &Event) {
        if let Some(old) = self.parents.insert(child.clone(), group.clone()) {
            if let Some(children) = self.nested_groups.get_mut(old.as_str()) {
                children.remove(child.as_str());
            }
        }
        self.nested_groups
            .entry(group.clone())
            .or_default()
            .insert(child.clone());
    }

    /// Mark `parent` as group (creating it if necessary) and move all `children` into it
    ///
    /// All children have to exist already.
    pub fn add_nested_group<I, S>(&mut self, parent: &str, children: I) -> Result<(), DcrGraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let children: Vec<Event> = children
            .into_iter()
            .map(|c| {
                self.events
                    .get(c.as_ref())
                    .cloned()
                    .ok_or_else(|| DcrGraphError::EventNotFound(c.as_ref().to_string()))
            })
            .collect::<Result<_, _>>()?;
        for child in &children {
            self.check_nesting(parent, child.as_str())?;
        }
        let group = self.add_group(parent);
        for child in &children {
            self.link_child(&group, child);
        }
        Ok(())
    }

    /// Add a relation between two existing events
    ///
    /// Both endpoints have to be given as labels or both as [`Event`]s.
    /// If the relation already exists, it is left unchanged.
    pub fn add_relation<'a, S, T>(
        &mut self,
        start: S,
        target: T,
        relation_type: RelationType,
    ) -> Result<(), DcrGraphError>
    where
        S: Into<EventRef<'a>>,
        T: Into<EventRef<'a>>,
    {
        let (start, target) = self.resolve_endpoints(start.into(), target.into())?;
        let relation = Relation::new(start, target, relation_type);
        self.relations.entry(relation.key()).or_insert(relation);
        Ok(())
    }

    /// Add a relation with quantifiers, overwriting the quantifiers of an existing one
    pub fn add_quantified_relation<'a, S, T>(
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
        let (start, target) = self.resolve_endpoints(start.into(), target.into())?;
        self.insert_relation(Relation::with_quantifiers(
            start,
            target,
            relation_type,
            quantifier_head,
            quantifier_tail,
        ));
        Ok(())
    }

    fn resolve_endpoints(
        &self,
        start: EventRef<'_>,
        target: EventRef<'_>,
    ) -> Result<(Event, Event), DcrGraphError> {
        let (start, target) = endpoint_labels(start, target)?;
        let lookup = |label: &str| {
            self.events
                .get(label)
                .cloned()
                .ok_or_else(|| DcrGraphError::EventNotFound(label.to_string()))
        };
        Ok((lookup(start)?, lookup(target)?))
    }

    /// Insert or replace a relation without checking its endpoints
    ///
    /// Used for layers that may reference events owned by another graph.
    pub(crate) fn insert_relation(&mut self, relation: Relation) {
        self.relations.insert(relation.key(), relation);
    }

    pub(crate) fn relation_mut(&mut self, key: &RelationKey) -> Option<&mut Relation> {
        self.relations.get_mut(key)
    }

    pub(crate) fn retain_relations<F: FnMut(&Relation) -> bool>(&mut self, mut f: F) {
        self.relations.retain(|_, r| f(r));
    }

    /// Replace all relations
    pub(crate) fn set_relations<I: IntoIterator<Item = Relation>>(&mut self, relations: I) {
        self.relations = relations.into_iter().map(|r| (r.key(), r)).collect();
    }

    /// Get the relation with the given start, target and type
    pub fn get_relation(
        &self,
        start: &str,
        target: &str,
        relation_type: RelationType,
    ) -> Option<&Relation> {
        self.relations
            .get(&(Event::new(start), Event::new(target), relation_type))
    }

    /// Remove a relation (matched by start, target and type)
    ///
    /// Returns false if no such relation exists.
    pub fn remove_relation(&mut self, relation: &Relation) -> bool {
        self.relations.remove(&relation.key()).is_some()
    }

    /// All relations starting or ending at the given event, sorted
    ///
    /// Returns an empty list for unknown events.
    pub fn get_incidental_relations(&self, event: &str) -> Vec<Relation> {
        if !self.events.contains(event) {
            return Vec::new();
        }
        let mut rels: Vec<Relation> = self
            .relations
            .values()
            .filter(|r| r.touches(event))
            .cloned()
            .collect();
        rels.sort();
        rels
    }

    /// Remove an event together with its relations, its marking and its group memberships
    ///
    /// Children of a removed group become root events.
    pub fn remove_event(&mut self, event: &str) -> Result<Event, DcrGraphError> {
        let removed = self
            .events
            .take(event)
            .ok_or_else(|| DcrGraphError::EventNotFound(event.to_string()))?;
        self.relations.retain(|_, r| !r.touches(event));
        self.marking.remove_event(event);
        if let Some(parent) = self.parents.remove(event) {
            if let Some(children) = self.nested_groups.get_mut(parent.as_str()) {
                children.remove(event);
            }
        }
        if let Some(children) = self.nested_groups.remove(event) {
            for child in children {
                self.parents.remove(child.as_str());
            }
        }
        Ok(removed)
    }

    /// Get an event by label
    pub fn get_event(&self, activity: &str) -> Option<&Event> {
        self.events.get(activity)
    }

    /// Whether an event with the given label exists
    pub fn contains_event(&self, activity: &str) -> bool {
        self.events.contains(activity)
    }

    /// All events (including groups)
    pub fn events(&self) -> &HashSet<Event> {
        &self.events
    }

    /// All relations
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Number of relations
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Current marking
    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    /// Group map: group event to its direct children
    pub fn nested_groups(&self) -> &HashMap<Event, HashSet<Event>> {
        &self.nested_groups
    }

    /// All group events
    pub fn groups(&self) -> impl Iterator<Item = &Event> {
        self.nested_groups.keys()
    }

    /// Whether the event is a group
    pub fn is_group(&self, activity: &str) -> bool {
        self.nested_groups.contains_key(activity)
    }

    /// Direct parent group of an event
    pub fn parent_of(&self, activity: &str) -> Option<&Event> {
        self.parents.get(activity)
    }

    /// Marking types of an event
    pub fn event_marking(&self, activity: &str) -> HashSet<MarkingType> {
        self.marking.get_event_marking(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_graph() -> DcrGraph {
        let mut g = DcrGraph::new();
        for a in ["A", "B", "C"] {
            g.add_event(a);
        }
        g
    }

    #[test]
    fn test_marking() {
        let mut m = Marking::default();
        m.add_event(Event::new("A"), MarkingType::Executed);
        m.add_event(Event::new("A"), MarkingType::Pending);
        m.add_event(Event::new("B"), MarkingType::Included);
        assert_eq!(
            m.get_event_marking("A"),
            HashSet::from([MarkingType::Executed, MarkingType::Pending])
        );
        assert!(m.get_set(MarkingType::Included).contains("B"));
        assert!(m.remove_event("A"));
        assert!(m.get_event_marking("A").is_empty());
        assert!(!m.remove_event("A"));
        assert!(m.get_set(MarkingType::Included).contains("B"));
    }

    #[test]
    fn test_add_event_idempotent() {
        let mut g = DcrGraph::new();
        let a1 = g.add_event("A");
        let a2 = g
            .add_event_with_marking("A", [MarkingType::Pending], None)
            .unwrap();
        assert_eq!(a1, a2);
        assert_eq!(g.events().len(), 1);
        assert_eq!(
            g.event_marking("A"),
            HashSet::from([MarkingType::Included, MarkingType::Pending])
        );
    }

    #[test]
    fn test_add_event_with_new_parent() {
        let mut g = DcrGraph::new();
        let a = g
            .add_event_with_marking("A", [MarkingType::Included], Some("G"))
            .unwrap();
        assert!(g.is_group("G"));
        assert_eq!(g.parent_of("A"), Some(&Event::new("G")));
        assert!(g.nested_groups()["G"].contains(&a));
        assert!(g.event_marking("G").contains(&MarkingType::Included));
    }

    #[test]
    fn test_nested_groups_consistent() {
        let mut g = abc_graph();
        g.add_nested_group("G1", ["A", "B"]).unwrap();
        g.add_nested_group("G2", ["B"]).unwrap();
        g.add_nested_group("G1", ["G2"]).unwrap();
        assert_eq!(g.parent_of("B"), Some(&Event::new("G2")));
        assert_eq!(g.parent_of("G2"), Some(&Event::new("G1")));
        assert!(!g.nested_groups()["G1"].contains("B"));
        assert!(g.nested_groups()["G1"].contains("A"));
        for (group, children) in g.nested_groups() {
            for c in children {
                assert_eq!(g.parent_of(c.as_str()), Some(group));
            }
        }
    }

    #[test]
    fn test_nested_group_errors() {
        let mut g = abc_graph();
        assert_eq!(
            g.add_nested_group("G", ["A", "X"]),
            Err(DcrGraphError::EventNotFound("X".to_string()))
        );
        assert!(!g.contains_event("G"));
        g.add_nested_group("G", ["A"]).unwrap();
        assert!(matches!(
            g.add_nested_group("A", ["G"]),
            Err(DcrGraphError::InvalidNesting { .. })
        ));
    }

    #[test]
    fn test_add_and_get_relation() {
        let mut g = abc_graph();
        g.add_relation("A", "B", RelationType::Condition).unwrap();
        let a = Event::new("A");
        let c = Event::new("C");
        g.add_relation(&a, &c, RelationType::Response).unwrap();
        assert!(g.get_relation("A", "B", RelationType::Condition).is_some());
        assert!(g.get_relation("A", "B", RelationType::Response).is_none());
        assert!(g.get_relation("A", "C", RelationType::Response).is_some());
        g.add_relation("A", "B", RelationType::Condition).unwrap();
        assert_eq!(g.relation_count(), 2);
    }

    #[test]
    fn test_add_relation_errors() {
        let mut g = abc_graph();
        let a = Event::new("A");
        assert_eq!(
            g.add_relation(&a, "B", RelationType::Include),
            Err(DcrGraphError::TypeMismatch)
        );
        assert_eq!(
            g.add_relation("A", "X", RelationType::Include),
            Err(DcrGraphError::EventNotFound("X".to_string()))
        );
        assert_eq!(g.relation_count(), 0);
    }

    #[test]
    fn test_quantified_relation_overwrites() {
        let mut g = abc_graph();
        g.add_quantified_relation("A", "B", RelationType::Exclude, true, true)
            .unwrap();
        g.add_quantified_relation("A", "B", RelationType::Exclude, false, true)
            .unwrap();
        assert_eq!(g.relation_count(), 1);
        let r = g.get_relation("A", "B", RelationType::Exclude).unwrap();
        assert_eq!(r.quantifiers(), (false, true));
        assert!(r.is_one_to_many());
    }

    #[test]
    fn test_remove_relation() {
        let mut g = abc_graph();
        g.add_relation("A", "B", RelationType::Include).unwrap();
        let rel = Relation::new(Event::new("A"), Event::new("B"), RelationType::Include);
        assert!(g.remove_relation(&rel));
        assert!(!g.remove_relation(&rel));
    }

    #[test]
    fn test_incidental_relations() {
        let mut g = abc_graph();
        g.add_relation("A", "B", RelationType::Include).unwrap();
        g.add_relation("C", "A", RelationType::Response).unwrap();
        g.add_relation("B", "C", RelationType::Exclude).unwrap();
        let rels = g.get_incidental_relations("A");
        assert_eq!(rels.len(), 2);
        assert!(rels.iter().all(|r| r.touches("A")));
        assert!(g.get_incidental_relations("X").is_empty());
    }

    #[test]
    fn test_remove_event_cascades() {
        let mut g = abc_graph();
        g.add_relation("A", "B", RelationType::Include).unwrap();
        g.add_relation("B", "C", RelationType::Exclude).unwrap();
        g.add_nested_group("G", ["A", "C"]).unwrap();
        g.remove_event("A").unwrap();
        assert!(!g.contains_event("A"));
        assert!(!g.marking().included.contains("A"));
        assert_eq!(g.relation_count(), 1);
        assert!(!g.nested_groups()["G"].contains("A"));

        g.remove_event("G").unwrap();
        assert_eq!(g.parent_of("C"), None);
        assert!(g.groups().next().is_none());
        assert_eq!(
            g.remove_event("G"),
            Err(DcrGraphError::EventNotFound("G".to_string()))
        );
    }

    #[test]
    fn test_relation_type_template_keys() {
        for t in ALL_RELATION_TYPES {
            assert_eq!(RelationType::from_template_key(t.template_key()), Some(*t));
        }
        assert!(RelationType::Condition.is_target_keyed());
        assert!(!RelationType::Response.is_target_keyed());
    }
}
