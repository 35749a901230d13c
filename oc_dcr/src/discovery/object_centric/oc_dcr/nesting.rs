//! Discovery of nested groups in DCR graphs
//!
//! Events sharing the same relations (same related event, relation type and direction) are
//! grouped into synthetic group events (`Group1`, `Group2`, ...), which take over the shared
//! relations. Groups are searched recursively inside already found groups.
use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::core::process_models::dcr::{
    template::DcrTemplate, DcrGraph, RelationType, ALL_RELATION_TYPES,
};

/// Direction of a relation, seen from an encoded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Incoming (the encoded event is the target, or the start of a condition)
    In,
    /// Outgoing
    Out,
}

impl Direction {
    /// Direction of the entry stored at the start event of a relation
    ///
    /// Conditions are flipped: the condition (start) holds an `In` entry pointing to the event
    /// it constrains.
    pub fn of_start(relation_type: RelationType) -> Self {
        if relation_type.is_target_keyed() {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }
}

/// Related event, relation type and direction
pub type EncodingEntry = (String, RelationType, Direction);
/// All relations of an event
pub type Encoding = BTreeSet<EncodingEntry>;

/// A group found by [`Nesting::find_largest_nesting`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundNesting {
    /// Label of the new group event
    pub group: String,
    /// Events put into the group
    pub events: BTreeSet<String>,
    /// Relations shared by all events, now held by the group
    pub shared: Encoding,
}

/// One run of the nesting algorithm
///
/// The group counter is scoped to the run, so group labels are only unique within one graph.
/// All sets are iterated in label order, which makes the result deterministic.
#[derive(Debug, Clone, Default)]
pub struct Nesting {
    enc: BTreeMap<String, Encoding>,
    parents: BTreeMap<String, String>,
    nesting_ids: BTreeSet<String>,
    existing_groups: BTreeSet<String>,
    nest_id: usize,
}

impl Nesting {
    /// Create a new nesting run
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode all events of the template and remember its groups
    pub fn create_encoding(&mut self, template: &DcrTemplate) {
        for e in &template.events {
            self.enc.entry(e.clone()).or_default();
        }
        for relation_type in ALL_RELATION_TYPES {
            let direction = Direction::of_start(*relation_type);
            for (start, target, _) in template.relation_pairs(*relation_type) {
                self.enc.entry(start.to_string()).or_default().insert((
                    target.to_string(),
                    *relation_type,
                    direction,
                ));
                self.enc.entry(target.to_string()).or_default().insert((
                    start.to_string(),
                    *relation_type,
                    direction.opposite(),
                ));
            }
        }
        for (group, children) in &template.nestedgroups {
            self.existing_groups.insert(group.clone());
            for c in children {
                self.parents.insert(c.clone(), group.clone());
            }
        }
    }

    /// Encoding of an event (empty for unknown events)
    pub fn encoding(&self, event: &str) -> Encoding {
        self.enc.get(event).cloned().unwrap_or_default()
    }

    /// Synthetic groups created so far
    pub fn nesting_ids(&self) -> &BTreeSet<String> {
        &self.nesting_ids
    }

    /// Parent of every nested event
    pub fn parents(&self) -> &BTreeMap<String, String> {
        &self.parents
    }

    /// Find the largest group among the candidates, and recursively its sub-groups
    ///
    /// Returns the found group first, followed by all its sub-groups. Returns an empty list if no
    /// two candidates share a relation.
    pub fn find_largest_nesting(
        &mut self,
        candidates: &BTreeSet<String>,
        parent: Option<&str>,
    ) -> Vec<FoundNesting> {
        let empty = Encoding::new();
        let mut cands: BTreeMap<Encoding, BTreeSet<String>> = BTreeMap::new();
        for (e, j) in candidates.iter().tuple_combinations() {
            let enc_e = self.enc.get(e).unwrap_or(&empty);
            let enc_j = self.enc.get(j).unwrap_or(&empty);
            let shared: Encoding = enc_e.intersection(enc_j).cloned().collect();
            if !shared.is_empty() {
                let events = cands.entry(shared).or_default();
                events.insert(e.clone());
                events.insert(j.clone());
            }
        }

        let mut best: Option<(Encoding, BTreeSet<String>)> = None;
        let mut best_score = 0;
        for (shared, events) in cands {
            let score = (events.len() - 1) * shared.len();
            if score > best_score {
                best_score = score;
                best = Some((shared, events));
            }
        }
        let Some((shared, members)) = best else {
            return Vec::new();
        };
        if members.len() < 2 {
            return Vec::new();
        }

        self.nest_id += 1;
        let group = format!("Group{}", self.nest_id);
        tracing::debug!(
            "Nesting {} events into {group} (sharing {} relations)",
            members.len(),
            shared.len()
        );
        self.nesting_ids.insert(group.clone());
        self.enc.insert(group.clone(), shared.clone());
        if let Some(parent) = parent {
            self.parents.insert(group.clone(), parent.to_string());
        }
        for e in &members {
            self.parents.insert(e.clone(), group.clone());
            if let Some(enc) = self.enc.get_mut(e) {
                enc.retain(|entry| !shared.contains(entry));
            }
            for (other, relation_type, direction) in &shared {
                if let Some(other_enc) = self.enc.get_mut(other) {
                    other_enc.remove(&(e.clone(), *relation_type, direction.opposite()));
                    other_enc.insert((group.clone(), *relation_type, direction.opposite()));
                }
            }
        }

        let mut ret = vec![FoundNesting {
            group: group.clone(),
            events: members.clone(),
            shared,
        }];
        let mut remaining = members;
        loop {
            let sub = self.find_largest_nesting(&remaining, Some(&group));
            if sub.is_empty() {
                break;
            }
            for found in &sub {
                remaining.retain(|e| !found.events.contains(e));
            }
            ret.extend(sub);
        }
        ret
    }

    /// Nest all (non-group) events
    ///
    /// Events are nested among their siblings: root events with each other and the children of
    /// every existing group with each other (new groups then become children of that group).
    pub fn nest(&mut self) -> Vec<FoundNesting> {
        let mut partitions: BTreeMap<Option<String>, BTreeSet<String>> = BTreeMap::new();
        for e in self.enc.keys() {
            if self.existing_groups.contains(e) {
                continue;
            }
            partitions
                .entry(self.parents.get(e).cloned())
                .or_default()
                .insert(e.clone());
        }
        let mut ret = Vec::new();
        for (parent, mut remaining) in partitions {
            loop {
                let found = self.find_largest_nesting(&remaining, parent.as_deref());
                if found.is_empty() {
                    break;
                }
                for f in &found {
                    remaining.retain(|e| !f.events.contains(e));
                }
                ret.extend(found);
            }
        }
        ret
    }

    /// Remove synthetic groups with only one child
    ///
    /// A group whose only child is another synthetic group absorbs that child. A group with a
    /// single plain event as child is dissolved into that event. Repeated until no such group is
    /// left.
    pub fn remove_redundant_nestings(&mut self) {
        loop {
            let single = self.nesting_ids.iter().find_map(|g| {
                let children: Vec<&String> = self
                    .parents
                    .iter()
                    .filter(|(_, p)| *p == g)
                    .map(|(c, _)| c)
                    .collect();
                match children.as_slice() {
                    [child] => Some((g.clone(), (*child).clone())),
                    _ => None,
                }
            });
            let Some((group, child)) = single else {
                break;
            };
            if self.nesting_ids.contains(&child) {
                tracing::debug!("Merging {child} into {group}");
                for p in self.parents.values_mut() {
                    if *p == child {
                        *p = group.clone();
                    }
                }
                self.parents.remove(&child);
                self.nesting_ids.remove(&child);
                self.merge_encoding(&child, &group);
            } else {
                tracing::debug!("Dissolving {group} into {child}");
                match self.parents.remove(&group) {
                    Some(grand_parent) => self.parents.insert(child.clone(), grand_parent),
                    None => self.parents.remove(&child),
                };
                self.nesting_ids.remove(&group);
                self.merge_encoding(&group, &child);
            }
        }
    }

    /// Replace `from` by `into` in all encodings and merge the encoding of `from` into `into`
    fn merge_encoding(&mut self, from: &str, into: &str) {
        if let Some(from_enc) = self.enc.remove(from) {
            self.enc.entry(into.to_string()).or_default().extend(from_enc);
        }
        for enc in self.enc.values_mut() {
            *enc = std::mem::take(enc)
                .into_iter()
                .map(|(other, relation_type, direction)| {
                    if other == from {
                        (into.to_string(), relation_type, direction)
                    } else {
                        (other, relation_type, direction)
                    }
                })
                .collect();
        }
    }

    /// Write the nesting result into the template
    ///
    /// All events become included, existing groups are kept (possibly with new synthetic groups
    /// as children) and the relations held by groups are added to the existing ones.
    pub fn get_nested_dcr_graph(&self, mut template: DcrTemplate) -> DcrTemplate {
        let events: BTreeSet<String> = self.enc.keys().cloned().collect();
        template.events = events.clone();
        template.marking.included = events;

        let mut nestedgroups: BTreeMap<String, BTreeSet<String>> = self
            .existing_groups
            .iter()
            .chain(self.nesting_ids.iter())
            .map(|g| (g.clone(), BTreeSet::new()))
            .collect();
        for (child, parent) in &self.parents {
            nestedgroups
                .entry(parent.clone())
                .or_default()
                .insert(child.clone());
        }
        template.nestedgroups = nestedgroups;

        for (e, enc) in &self.enc {
            for (other, relation_type, direction) in enc {
                if *direction == Direction::of_start(*relation_type) {
                    template.add_relation(e, other, *relation_type);
                }
            }
        }
        template.nestedgroups_map = self.parents.clone();
        template
    }
}

/// Discover nested groups in a DCR graph
///
/// Returns the template of the graph with synthetic groups, the relations they hold and the
/// `nestedgroupsMap` (child to parent). Relations of group members are kept; see
/// [`super::optimization::filter_template_relations`] for removing the ones implied by groups.
pub fn apply_nested(graph: &DcrGraph) -> DcrTemplate {
    let template = graph.to_template();
    let mut nesting = Nesting::new();
    nesting.create_encoding(&template);
    nesting.nest();
    nesting.remove_redundant_nestings();
    nesting.get_nested_dcr_graph(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(events: &[&str], relations: &[(&str, &str, RelationType)]) -> DcrGraph {
        let mut g = DcrGraph::new();
        for e in events {
            g.add_event(*e);
        }
        for (s, t, ty) in relations {
            g.add_relation(*s, *t, *ty).unwrap();
        }
        g
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Relations with every group replaced by its leaf descendants
    fn flatten(template: &DcrTemplate) -> BTreeSet<(String, String, RelationType)> {
        fn leaves(t: &DcrTemplate, e: &str) -> Vec<String> {
            match t.nestedgroups.get(e) {
                Some(children) => children.iter().flat_map(|c| leaves(t, c)).collect(),
                None => vec![e.to_string()],
            }
        }
        let mut ret = BTreeSet::new();
        for ty in ALL_RELATION_TYPES {
            for (s, t, _) in template.relation_pairs(*ty) {
                for ls in leaves(template, s) {
                    for lt in leaves(template, t) {
                        ret.insert((ls.clone(), lt, *ty));
                    }
                }
            }
        }
        ret
    }

    #[test]
    fn test_encoding_directions() {
        let g = graph(
            &["A", "B"],
            &[
                ("A", "B", RelationType::Condition),
                ("A", "B", RelationType::Exclude),
            ],
        );
        let mut nesting = Nesting::new();
        nesting.create_encoding(&g.to_template());
        let enc_a = nesting.encoding("A");
        assert!(enc_a.contains(&("B".to_string(), RelationType::Condition, Direction::In)));
        assert!(enc_a.contains(&("B".to_string(), RelationType::Exclude, Direction::Out)));
        let enc_b = nesting.encoding("B");
        assert!(enc_b.contains(&("A".to_string(), RelationType::Condition, Direction::Out)));
        assert!(enc_b.contains(&("A".to_string(), RelationType::Exclude, Direction::In)));
    }

    #[test]
    fn test_simple_nesting() {
        let g = graph(
            &["A", "B", "C"],
            &[
                ("A", "C", RelationType::Exclude),
                ("B", "C", RelationType::Exclude),
            ],
        );
        let nested = apply_nested(&g);
        assert_eq!(nested.events, set(&["A", "B", "C", "Group1"]));
        assert_eq!(nested.marking.included, nested.events);
        assert_eq!(nested.nestedgroups.get("Group1"), Some(&set(&["A", "B"])));
        assert!(nested.contains_relation("Group1", "C", RelationType::Exclude));
        assert!(nested.contains_relation("A", "C", RelationType::Exclude));
        assert_eq!(nested.nestedgroups_map.get("A").map(String::as_str), Some("Group1"));
        assert_eq!(flatten(&nested), flatten(&g.to_template()));
    }

    #[test]
    fn test_condition_nesting_is_target_keyed() {
        let g = graph(
            &["A", "B", "C"],
            &[
                ("A", "C", RelationType::Condition),
                ("B", "C", RelationType::Condition),
            ],
        );
        let nested = apply_nested(&g);
        assert_eq!(
            nested.conditions_for.get("C"),
            Some(&set(&["A", "B", "Group1"]))
        );
    }

    #[test]
    fn test_sub_nesting() {
        let g = graph(
            &["A", "B", "C", "D", "X", "Y"],
            &[
                ("A", "X", RelationType::Exclude),
                ("B", "X", RelationType::Exclude),
                ("C", "X", RelationType::Exclude),
                ("A", "Y", RelationType::Response),
                ("B", "Y", RelationType::Response),
            ],
        );
        let mut nesting = Nesting::new();
        let template = g.to_template();
        nesting.create_encoding(&template);
        let found = nesting.nest();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].events, set(&["A", "B", "C"]));
        assert_eq!(found[1].events, set(&["A", "B"]));
        nesting.remove_redundant_nestings();
        let nested = nesting.get_nested_dcr_graph(template.clone());

        assert_eq!(nested.nestedgroups.get("Group1"), Some(&set(&["C", "Group2"])));
        assert_eq!(nested.nestedgroups.get("Group2"), Some(&set(&["A", "B"])));
        assert_eq!(
            nested.nestedgroups_map.get("Group2").map(String::as_str),
            Some("Group1")
        );
        assert!(nested.contains_relation("Group1", "X", RelationType::Exclude));
        assert!(nested.contains_relation("Group2", "Y", RelationType::Response));
        assert!(!nested.contains_relation("Group1", "Y", RelationType::Response));
        assert_eq!(flatten(&nested), flatten(&template));
    }

    #[test]
    fn test_no_nesting_without_shared_relations() {
        let g = graph(&["A", "B"], &[("A", "B", RelationType::Response)]);
        let nested = apply_nested(&g);
        assert!(nested.nestedgroups.is_empty());
        assert!(nested.nestedgroups_map.is_empty());
        assert_eq!(nested.events, set(&["A", "B"]));
    }

    #[test]
    fn test_existing_groups_are_kept() {
        let mut g = graph(&["A", "B", "C"], &[]);
        g.add_nested_group("P", ["A", "B"]).unwrap();
        g.add_relation("A", "C", RelationType::Exclude).unwrap();
        g.add_relation("B", "C", RelationType::Exclude).unwrap();
        let nested = apply_nested(&g);
        assert_eq!(nested.nestedgroups.get("P"), Some(&set(&["Group1"])));
        assert_eq!(nested.nestedgroups.get("Group1"), Some(&set(&["A", "B"])));
        assert_eq!(
            nested.nestedgroups_map.get("Group1").map(String::as_str),
            Some("P")
        );
    }

    #[test]
    fn test_remove_redundant_absorbs_single_group_child() {
        let mut nesting = Nesting::new();
        for e in ["A", "B", "X", "Group1", "Group2"] {
            nesting.enc.insert(e.to_string(), Encoding::new());
        }
        nesting.nesting_ids = set(&["Group1", "Group2"]);
        nesting.parents.insert("Group2".into(), "Group1".into());
        nesting.parents.insert("A".into(), "Group2".into());
        nesting.parents.insert("B".into(), "Group2".into());
        nesting
            .enc
            .get_mut("Group2")
            .unwrap()
            .insert(("X".into(), RelationType::Exclude, Direction::Out));
        nesting
            .enc
            .get_mut("X")
            .unwrap()
            .insert(("Group2".into(), RelationType::Exclude, Direction::In));

        nesting.remove_redundant_nestings();
        assert_eq!(nesting.nesting_ids(), &set(&["Group1"]));
        assert_eq!(nesting.parents().get("A").map(String::as_str), Some("Group1"));
        assert!(!nesting.parents().contains_key("Group2"));
        assert!(nesting
            .encoding("Group1")
            .contains(&("X".into(), RelationType::Exclude, Direction::Out)));
        assert!(nesting
            .encoding("X")
            .contains(&("Group1".into(), RelationType::Exclude, Direction::In)));
    }

    #[test]
    fn test_remove_redundant_dissolves_single_event_child() {
        let mut nesting = Nesting::new();
        for e in ["A", "X", "Group1"] {
            nesting.enc.insert(e.to_string(), Encoding::new());
        }
        nesting.nesting_ids = set(&["Group1"]);
        nesting.parents.insert("A".into(), "Group1".into());
        nesting
            .enc
            .get_mut("Group1")
            .unwrap()
            .insert(("X".into(), RelationType::Response, Direction::Out));
        nesting
            .enc
            .get_mut("X")
            .unwrap()
            .insert(("Group1".into(), RelationType::Response, Direction::In));

        nesting.remove_redundant_nestings();
        assert!(nesting.nesting_ids().is_empty());
        assert!(nesting.parents().is_empty());
        assert!(nesting
            .encoding("A")
            .contains(&("X".into(), RelationType::Response, Direction::Out)));
        let nested = nesting.get_nested_dcr_graph(DcrTemplate::default());
        assert!(nested.contains_relation("A", "X", RelationType::Response));
        assert!(!nested.events.contains("Group1"));
    }
}
