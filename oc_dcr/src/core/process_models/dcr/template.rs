//! Dictionary-like interchange form of DCR graphs
//!
//! Relation dictionaries map one event label to a set of related labels. Conditions are keyed by
//! their target (`conditionsFor`: target to its conditions), all other relation types are keyed
//! by their start event. Object-centric templates store `(label, quantifier_head,
//! quantifier_tail)` triples instead of plain labels.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    DcrGraph, DcrGraphError, Event, EventLocation, MarkingType, OcDcrGraph, OcDcrObject,
    RelationType, ALL_RELATION_TYPES,
};

/// Marking part of a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateMarking {
    /// Executed events
    #[serde(default)]
    pub executed: BTreeSet<String>,
    /// Pending events
    #[serde(default)]
    pub pending: BTreeSet<String>,
    /// Included events
    #[serde(default)]
    pub included: BTreeSet<String>,
}

impl TemplateMarking {
    fn get_set_mut(&mut self, marking_type: MarkingType) -> &mut BTreeSet<String> {
        match marking_type {
            MarkingType::Executed => &mut self.executed,
            MarkingType::Included => &mut self.included,
            MarkingType::Pending => &mut self.pending,
        }
    }

    /// Marking types of the given event
    pub fn marking_of(&self, event: &str) -> HashSet<MarkingType> {
        let mut ret = HashSet::new();
        if self.executed.contains(event) {
            ret.insert(MarkingType::Executed);
        }
        if self.included.contains(event) {
            ret.insert(MarkingType::Included);
        }
        if self.pending.contains(event) {
            ret.insert(MarkingType::Pending);
        }
        ret
    }

    fn add(&mut self, event: &str, marking: &HashSet<MarkingType>) {
        for m in marking {
            self.get_set_mut(*m).insert(event.to_string());
        }
    }
}

/// Entry of a relation dictionary: a related label, possibly with extra data
pub trait TemplateTarget: Ord + Clone {
    /// Related event label
    fn label(&self) -> &str;
    /// Same entry with another label
    fn with_label(&self, label: String) -> Self;
}

impl TemplateTarget for String {
    fn label(&self) -> &str {
        self.as_str()
    }

    fn with_label(&self, label: String) -> Self {
        label
    }
}

/// Relation dictionary entry of object-centric templates: label, head and tail quantifier
pub type QuantifiedTarget = (String, bool, bool);

impl TemplateTarget for QuantifiedTarget {
    fn label(&self) -> &str {
        self.0.as_str()
    }

    fn with_label(&self, label: String) -> Self {
        (label, self.1, self.2)
    }
}

/// Graph template, generic over the relation dictionary entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(bound(deserialize = "R: Ord + Deserialize<'de>"))]
pub struct GraphTemplate<R: Ord> {
    /// All event labels (including groups)
    pub events: BTreeSet<String>,
    /// Marking
    #[serde(default)]
    pub marking: TemplateMarking,
    /// Include relations (start to targets)
    #[serde(rename = "includesTo", default)]
    pub includes_to: BTreeMap<String, BTreeSet<R>>,
    /// Exclude relations (start to targets)
    #[serde(rename = "excludesTo", default)]
    pub excludes_to: BTreeMap<String, BTreeSet<R>>,
    /// Response relations (start to targets)
    #[serde(rename = "responseTo", default)]
    pub response_to: BTreeMap<String, BTreeSet<R>>,
    /// Condition relations (target to conditions)
    #[serde(rename = "conditionsFor", default)]
    pub conditions_for: BTreeMap<String, BTreeSet<R>>,
    /// Nested groups (group to direct children)
    #[serde(default)]
    pub nestedgroups: BTreeMap<String, BTreeSet<String>>,
    /// Parent of every nested event (only produced by nesting)
    #[serde(
        rename = "nestedgroupsMap",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub nestedgroups_map: BTreeMap<String, String>,
}

/// Template of a plain [`DcrGraph`]
pub type DcrTemplate = GraphTemplate<String>;

impl<R: TemplateTarget> GraphTemplate<R> {
    /// Relation dictionary of a relation type
    pub fn relation_dict(&self, relation_type: RelationType) -> &BTreeMap<String, BTreeSet<R>> {
        match relation_type {
            RelationType::Include => &self.includes_to,
            RelationType::Exclude => &self.excludes_to,
            RelationType::Response => &self.response_to,
            RelationType::Condition => &self.conditions_for,
        }
    }

    /// Mutable relation dictionary of a relation type
    pub fn relation_dict_mut(
        &mut self,
        relation_type: RelationType,
    ) -> &mut BTreeMap<String, BTreeSet<R>> {
        match relation_type {
            RelationType::Include => &mut self.includes_to,
            RelationType::Exclude => &mut self.excludes_to,
            RelationType::Response => &mut self.response_to,
            RelationType::Condition => &mut self.conditions_for,
        }
    }

    /// Insert a relation whose entry already carries the opposite endpoint
    fn insert_entry(&mut self, relation_type: RelationType, start: &str, target: &str, entry: R) {
        let key = if relation_type.is_target_keyed() {
            target
        } else {
            start
        };
        self.relation_dict_mut(relation_type)
            .entry(key.to_string())
            .or_default()
            .insert(entry);
    }

    /// All relations of a type as `(start, target, entry)`
    pub fn relation_pairs(
        &self,
        relation_type: RelationType,
    ) -> impl Iterator<Item = (&str, &str, &R)> + '_ {
        self.relation_dict(relation_type)
            .iter()
            .flat_map(move |(key, entries)| {
                entries.iter().map(move |entry| {
                    if relation_type.is_target_keyed() {
                        (entry.label(), key.as_str(), entry)
                    } else {
                        (key.as_str(), entry.label(), entry)
                    }
                })
            })
    }

    /// Rename an event everywhere in the template
    pub fn rename_event(&mut self, old: &str, new: &str) {
        let rename = |s: &str| {
            if s == old {
                new.to_string()
            } else {
                s.to_string()
            }
        };
        let rename_set = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter().map(|s| rename(s.as_str())).collect()
        };
        self.events = rename_set(&self.events);
        self.marking.executed = rename_set(&self.marking.executed);
        self.marking.pending = rename_set(&self.marking.pending);
        self.marking.included = rename_set(&self.marking.included);
        for relation_type in ALL_RELATION_TYPES {
            let dict = std::mem::take(self.relation_dict_mut(*relation_type));
            *self.relation_dict_mut(*relation_type) = dict
                .into_iter()
                .map(|(k, entries)| {
                    (
                        rename(k.as_str()),
                        entries
                            .into_iter()
                            .map(|e| e.with_label(rename(e.label())))
                            .collect(),
                    )
                })
                .collect();
        }
        self.nestedgroups = self
            .nestedgroups
            .iter()
            .map(|(g, children)| (rename(g.as_str()), rename_set(children)))
            .collect();
        self.nestedgroups_map = self
            .nestedgroups_map
            .iter()
            .map(|(c, p)| (rename(c.as_str()), rename(p.as_str())))
            .collect();
    }
}

impl<R: TemplateTarget + Serialize + for<'de> Deserialize<'de>> GraphTemplate<R> {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl DcrTemplate {
    /// Add a relation, keyed by the dictionary direction of its type
    pub fn add_relation(&mut self, start: &str, target: &str, relation_type: RelationType) {
        let other = if relation_type.is_target_keyed() {
            start
        } else {
            target
        };
        self.insert_entry(relation_type, start, target, other.to_string());
    }

    /// Whether the relation is contained
    pub fn contains_relation(&self, start: &str, target: &str, relation_type: RelationType) -> bool {
        let (key, other) = if relation_type.is_target_keyed() {
            (target, start)
        } else {
            (start, target)
        };
        self.relation_dict(relation_type)
            .get(key)
            .is_some_and(|s| s.contains(other))
    }
}

/// Template of an [`OcDcrGraph`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OcDcrTemplate {
    /// Events, marking, relations (with quantifiers) and nested groups of all layers
    #[serde(flatten)]
    pub graph: GraphTemplate<QuantifiedTarget>,
    /// Object type to the labels of its events
    #[serde(default)]
    pub objects: BTreeMap<String, BTreeSet<String>>,
    /// Spawn event label to spawned object types
    #[serde(rename = "spawnRelations", default)]
    pub spawn_relations: BTreeMap<String, BTreeSet<String>>,
}

impl OcDcrTemplate {
    /// Add a relation with quantifiers, keyed by the dictionary direction of its type
    pub fn add_relation(
        &mut self,
        start: &str,
        target: &str,
        relation_type: RelationType,
        quantifier_head: bool,
        quantifier_tail: bool,
    ) {
        let other = if relation_type.is_target_keyed() {
            start
        } else {
            target
        };
        self.graph.insert_entry(
            relation_type,
            start,
            target,
            (other.to_string(), quantifier_head, quantifier_tail),
        );
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn add_graph_structure<R: TemplateTarget>(template: &mut GraphTemplate<R>, graph: &DcrGraph) {
    for e in graph.events() {
        template.events.insert(e.to_string());
        template.marking.add(e.as_str(), &graph.event_marking(e.as_str()));
    }
    for (group, children) in graph.nested_groups() {
        template
            .nestedgroups
            .entry(group.to_string())
            .or_default()
            .extend(children.iter().map(|c| c.to_string()));
    }
}

fn add_events_with_marking<R: TemplateTarget>(
    graph: &mut DcrGraph,
    template: &GraphTemplate<R>,
    events: impl Iterator<Item = String>,
) -> Result<(), DcrGraphError> {
    for e in events {
        let marking = template.marking.marking_of(&e);
        graph.add_event_with_marking(e, marking, None)?;
    }
    Ok(())
}

impl DcrGraph {
    /// Convert to the template interchange form
    pub fn to_template(&self) -> DcrTemplate {
        let mut template = DcrTemplate::default();
        add_graph_structure(&mut template, self);
        for r in self.relations() {
            template.add_relation(r.start.as_str(), r.target.as_str(), r.relation_type);
        }
        template
    }

    /// Build a graph from the template interchange form
    ///
    /// All related events have to be listed in `events`; marking entries of unknown events are
    /// ignored.
    pub fn from_template(template: &DcrTemplate) -> Result<Self, DcrGraphError> {
        let mut graph = DcrGraph::new();
        add_events_with_marking(&mut graph, template, template.events.iter().cloned())?;
        for relation_type in ALL_RELATION_TYPES {
            for (start, target, _) in template.relation_pairs(*relation_type) {
                graph.add_relation(start, target, *relation_type)?;
            }
        }
        for (group, children) in &template.nestedgroups {
            graph.add_nested_group(group, children)?;
        }
        Ok(graph)
    }
}

impl OcDcrGraph {
    /// Convert to the template interchange form
    pub fn to_template(&self) -> OcDcrTemplate {
        let mut template = OcDcrTemplate::default();
        add_graph_structure(&mut template.graph, self.top_level());
        for (object_type, object) in self.objects() {
            add_graph_structure(&mut template.graph, object.graph());
            template.objects.insert(
                object_type.clone(),
                object.graph().events().iter().map(|e| e.to_string()).collect(),
            );
            if let Some(spawn) = object.spawn() {
                template
                    .spawn_relations
                    .entry(spawn.to_string())
                    .or_default()
                    .insert(object_type.clone());
            }
        }
        for r in self.get_all_relations() {
            template.add_relation(
                r.start.as_str(),
                r.target.as_str(),
                r.relation_type,
                r.quantifier_head,
                r.quantifier_tail,
            );
        }
        template
    }

    /// Build a graph from the template interchange form
    ///
    /// Events listed under `objects` are placed into the corresponding object, all others stay
    /// on the top level. Relations are re-routed by [`OcDcrGraph::add_relation`], keeping their
    /// quantifiers.
    pub fn from_template(template: &OcDcrTemplate) -> Result<Self, DcrGraphError> {
        let graph_template = &template.graph;
        let object_members: HashSet<&str> = template
            .objects
            .values()
            .flat_map(|members| members.iter().map(String::as_str))
            .collect();

        let mut ret = OcDcrGraph::new();
        add_events_with_marking(
            ret.top_level_mut(),
            graph_template,
            graph_template
                .events
                .iter()
                .filter(|e| !object_members.contains(e.as_str()))
                .cloned(),
        )?;

        let spawn_of_type = |object_type: &str| {
            template
                .spawn_relations
                .iter()
                .find(|(_, types)| types.contains(object_type))
                .map(|(spawn, _)| Event::new(spawn.as_str()))
        };
        for (object_type, members) in &template.objects {
            let mut graph = DcrGraph::new();
            add_events_with_marking(&mut graph, graph_template, members.iter().cloned())?;
            ret.add_object(OcDcrObject::new(
                spawn_of_type(object_type),
                object_type.as_str(),
                graph,
            ));
        }
        for (spawn, types) in &template.spawn_relations {
            for object_type in types {
                if ret.object(object_type).is_none() {
                    ret.add_object(OcDcrObject::new(
                        Some(Event::new(spawn.as_str())),
                        object_type.as_str(),
                        DcrGraph::new(),
                    ));
                }
            }
        }

        for (group, children) in &graph_template.nestedgroups {
            let location = ret
                .location_of(group)
                .or_else(|| children.iter().find_map(|c| ret.location_of(c)))
                .cloned()
                .unwrap_or(EventLocation::TopLevel);
            let layer = match &location {
                EventLocation::TopLevel => ret.top_level_mut(),
                EventLocation::Object(t) => ret
                    .object_mut(t)
                    .ok_or_else(|| DcrGraphError::UnknownObject(t.clone()))?
                    .graph_mut(),
            };
            layer.add_nested_group(group, children)?;
        }
        ret.update_activities();

        for relation_type in ALL_RELATION_TYPES {
            for (start, target, (_, head, tail)) in graph_template.relation_pairs(*relation_type) {
                ret.add_relation(start, target, *relation_type, *head, *tail)?;
            }
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dcr() -> DcrGraph {
        let mut g = DcrGraph::new();
        g.add_event("Event1");
        g.add_group("Event2");
        g.add_event_with_marking("Event3", [MarkingType::Included], Some("Event2"))
            .unwrap();
        g.add_group("Event4");
        g.add_nested_group("Event2", ["Event4"]).unwrap();
        g.add_event_with_marking("Event5", [MarkingType::Included], Some("Event4"))
            .unwrap();
        g.add_event_with_marking("Event6", [MarkingType::Pending, MarkingType::Included], None)
            .unwrap();
        g.add_event_with_marking("Event8", [MarkingType::Pending], Some("Event7"))
            .unwrap();
        g.add_relation("Event6", "Event1", RelationType::Condition)
            .unwrap();
        g.add_relation("Event7", "Event2", RelationType::Condition)
            .unwrap();
        g.add_relation("Event7", "Event2", RelationType::Response)
            .unwrap();
        g.add_relation("Event8", "Event1", RelationType::Exclude)
            .unwrap();
        g.add_relation("Event1", "Event4", RelationType::Include)
            .unwrap();
        g
    }

    #[test]
    fn test_dcr_template_layout() {
        let t = sample_dcr().to_template();
        assert_eq!(t.events.len(), 8);
        assert_eq!(
            t.marking.pending,
            BTreeSet::from(["Event6".to_string(), "Event8".to_string()])
        );
        assert!(t.marking.included.contains("Event1"));
        assert!(t.conditions_for["Event1"].contains("Event6"));
        assert!(t.conditions_for["Event2"].contains("Event7"));
        assert!(t.response_to["Event7"].contains("Event2"));
        assert!(t.includes_to["Event1"].contains("Event4"));
        assert!(t.excludes_to["Event8"].contains("Event1"));
        assert_eq!(
            t.nestedgroups["Event2"],
            BTreeSet::from(["Event3".to_string(), "Event4".to_string()])
        );
        assert_eq!(t.nestedgroups["Event7"], BTreeSet::from(["Event8".to_string()]));
        assert!(t.contains_relation("Event6", "Event1", RelationType::Condition));
        assert!(!t.contains_relation("Event1", "Event6", RelationType::Condition));
    }

    #[test]
    fn test_dcr_template_json_keys() {
        let json = sample_dcr().to_template().to_json().unwrap();
        for key in ["includesTo", "excludesTo", "responseTo", "conditionsFor", "nestedgroups"] {
            assert!(json.contains(key));
        }
        assert!(!json.contains("nestedgroupsMap"));
        let back = DcrTemplate::from_json(&json).unwrap();
        assert_eq!(back, sample_dcr().to_template());
    }

    #[test]
    fn test_template_json_missing_relation_keys() {
        let t = DcrTemplate::from_json(r#"{"events":["A","B"],"responseTo":{"A":["B"]}}"#).unwrap();
        assert!(t.contains_relation("A", "B", RelationType::Response));
        assert!(t.includes_to.is_empty());
        assert!(t.conditions_for.is_empty());
        assert!(t.marking.included.is_empty());

        let t = GraphTemplate::<QuantifiedTarget>::from_json(
            r#"{"events":["A","B"],"conditionsFor":{"B":[["A",true,false]]}}"#,
        )
        .unwrap();
        assert!(t.conditions_for["B"].contains(&("A".to_string(), true, false)));
        assert!(t.excludes_to.is_empty());
    }

    #[test]
    fn test_dcr_from_template() {
        let original = sample_dcr();
        let rebuilt = DcrGraph::from_template(&original.to_template()).unwrap();
        assert_eq!(rebuilt.events(), original.events());
        assert_eq!(rebuilt.marking(), original.marking());
        assert_eq!(rebuilt.parent_of("Event5"), Some(&Event::new("Event4")));
        assert_eq!(rebuilt.parent_of("Event4"), Some(&Event::new("Event2")));
        assert!(rebuilt
            .get_relation("Event6", "Event1", RelationType::Condition)
            .is_some());
        assert_eq!(rebuilt.relation_count(), original.relation_count());
    }

    #[test]
    fn test_dcr_from_template_unknown_event() {
        let mut t = DcrTemplate::default();
        t.events.insert("A".to_string());
        t.add_relation("A", "B", RelationType::Response);
        assert_eq!(
            DcrGraph::from_template(&t).unwrap_err(),
            DcrGraphError::EventNotFound("B".to_string())
        );
    }

    fn sample_oc_dcr() -> OcDcrGraph {
        let mut g = OcDcrGraph::new();
        g.add_event("Event1", None).unwrap();
        g.add_event("Event2", None).unwrap();

        let mut object1 = OcDcrObject::new(Some(Event::new("Create1")), "Object1", DcrGraph::new());
        object1
            .graph_mut()
            .add_event_with_marking(
                "Object1_Event1",
                [MarkingType::Pending, MarkingType::Included],
                None,
            )
            .unwrap();
        object1
            .graph_mut()
            .add_event_with_marking("Object1_Event3", [MarkingType::Pending], Some("Object1_Event2"))
            .unwrap();
        object1
            .graph_mut()
            .add_event_with_marking("Object1_Event2", [MarkingType::Executed], None)
            .unwrap();
        object1
            .add_relation("Object1_Event1", "Object1_Event2", RelationType::Condition, false, false)
            .unwrap();
        object1
            .add_relation("Object1_Event1", "Object1_Event2", RelationType::Include, true, true)
            .unwrap();
        g.add_object(object1);

        let mut object2 = OcDcrObject::new(Some(Event::new("Create2")), "Object2", DcrGraph::new());
        object2
            .graph_mut()
            .add_event_with_marking("Object2_Event1", [MarkingType::Pending], None)
            .unwrap();
        g.add_object(object2);

        g.add_relation("Event1", "Event2", RelationType::Exclude, false, false)
            .unwrap();
        for t in ALL_RELATION_TYPES {
            g.add_relation("Object2_Event1", "Object1_Event2", *t, true, true)
                .unwrap();
        }
        g
    }

    #[test]
    fn test_oc_dcr_template_layout() {
        let t = sample_oc_dcr().to_template();
        assert!(t.graph.events.contains("Event1"));
        assert!(t.graph.events.contains("Object2_Event1"));
        assert_eq!(
            t.graph.marking.executed,
            BTreeSet::from(["Object1_Event2".to_string()])
        );
        assert!(t.graph.marking.included.contains("Create1"));
        assert!(t.graph.excludes_to["Event1"].contains(&("Event2".to_string(), false, false)));
        assert!(t.graph.includes_to["Object1_Event1"]
            .contains(&("Object1_Event2".to_string(), true, true)));
        assert!(t.graph.conditions_for["Object1_Event2"]
            .contains(&("Object1_Event1".to_string(), false, false)));
        assert!(t.graph.conditions_for["Object1_Event2"]
            .contains(&("Object2_Event1".to_string(), true, true)));
        assert!(t.graph.response_to["Object2_Event1"]
            .contains(&("Object1_Event2".to_string(), true, true)));
        assert_eq!(
            t.graph.nestedgroups["Object1_Event2"],
            BTreeSet::from(["Object1_Event3".to_string()])
        );
        assert_eq!(
            t.objects["Object1"],
            BTreeSet::from([
                "Object1_Event1".to_string(),
                "Object1_Event2".to_string(),
                "Object1_Event3".to_string()
            ])
        );
        assert!(t.spawn_relations["Create2"].contains("Object2"));
        let json = t.to_json().unwrap();
        assert!(json.contains("spawnRelations"));
        assert_eq!(OcDcrTemplate::from_json(&json).unwrap(), t);
    }

    #[test]
    fn test_oc_dcr_from_template() {
        let original = sample_oc_dcr();
        let rebuilt = OcDcrGraph::from_template(&original.to_template()).unwrap();
        assert_eq!(rebuilt.to_template(), original.to_template());
        assert_eq!(
            rebuilt.location_of("Object1_Event3"),
            Some(&EventLocation::Object("Object1".to_string()))
        );
        assert_eq!(
            rebuilt.object("Object2").unwrap().spawn(),
            Some(&Event::new("Create2"))
        );
        assert_eq!(rebuilt.sync_relations().count(), 4);
        assert!(rebuilt
            .object("Object1")
            .unwrap()
            .graph()
            .is_group("Object1_Event2"));
    }

    #[test]
    fn test_rename_event() {
        let mut t = sample_dcr().to_template();
        t.rename_event("Event2", "Group");
        assert!(!t.events.contains("Event2"));
        assert!(t.conditions_for["Group"].contains("Event7"));
        assert!(t.response_to["Event7"].contains("Group"));
        assert!(t.nestedgroups.contains_key("Group"));
    }
}
