//! Optimizing discovered (OC-)DCR graphs
//!
//! Removes relations implied by others: transitive conditions and responses, conditions and
//! responses parallel to an exclude, relations implied by nested groups and synchronizing
//! relations between object types without derived-entity relation.
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::{
    algo::{
        has_path_connecting, toposort,
        tred::{dag_to_toposorted_adjacency_list, dag_transitive_reduction_closure},
    },
    graph::{DiGraph, NodeIndex},
};
use rayon::prelude::*;

use crate::core::process_models::dcr::{
    template::DcrTemplate, DcrGraph, DcrGraphError, EventLocation, OcDcrGraph, OcDcrObject,
    Relation, RelationType, ALL_RELATION_TYPES,
};

use super::nesting::apply_nested;

/// Transitive reduction of a set of relations (of one relation type)
///
/// Relations are treated as edges between their start and target labels. Cycles are broken
/// by repeatedly removing one edge of a cycle; removed edges are always kept. The remaining
/// acyclic graph is reduced and the original relation values of all kept edges are returned
/// (in input order), so quantifiers survive.
pub fn transitive_reduction<'a, I>(relations: I) -> Vec<Relation>
where
    I: IntoIterator<Item = &'a Relation>,
{
    let relations: Vec<&Relation> = relations.into_iter().collect();
    if relations.is_empty() {
        return Vec::new();
    }
    let labels: BTreeSet<&str> = relations
        .iter()
        .flat_map(|r| [r.start.as_str(), r.target.as_str()])
        .collect();
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: HashMap<&str, NodeIndex> = labels
        .into_iter()
        .map(|label| (label, graph.add_node(label)))
        .collect();
    for r in &relations {
        graph.update_edge(nodes[r.start.as_str()], nodes[r.target.as_str()], ());
    }

    let mut kept: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let order = loop {
        match toposort(&graph, None) {
            Ok(order) => break order,
            Err(cycle) => {
                let Some((from, to)) = cycle_edge(&graph, cycle.node_id()) else {
                    return relations.into_iter().cloned().collect();
                };
                if let Some(edge) = graph.find_edge(from, to) {
                    graph.remove_edge(edge);
                }
                kept.insert((from, to));
            }
        }
    };

    let (adjacency, _) = dag_to_toposorted_adjacency_list::<_, usize>(&graph, &order);
    let (reduction, _) = dag_transitive_reduction_closure(&adjacency);
    kept.extend(
        reduction
            .edge_indices()
            .filter_map(|e| reduction.edge_endpoints(e))
            .map(|(a, b)| (order[a], order[b])),
    );

    relations
        .into_iter()
        .filter(|r| kept.contains(&(nodes[r.start.as_str()], nodes[r.target.as_str()])))
        .cloned()
        .collect()
}

/// First outgoing edge of `node` that lies on a cycle through `node`
fn cycle_edge(graph: &DiGraph<&str, ()>, node: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
    let mut successors: Vec<NodeIndex> = graph.neighbors(node).collect();
    successors.sort();
    successors
        .into_iter()
        .find(|succ| *succ == node || has_path_connecting(graph, *succ, node, None))
        .map(|succ| (node, succ))
}

/// Remove relations with a parallel exclude (same start and target)
pub fn filter_excluded_relations(relations: Vec<Relation>, excludes: &[Relation]) -> Vec<Relation> {
    if excludes.is_empty() {
        return relations;
    }
    let exclude_edges: HashSet<(&str, &str)> = excludes
        .iter()
        .map(|r| (r.start.as_str(), r.target.as_str()))
        .collect();
    relations
        .into_iter()
        .filter(|r| !exclude_edges.contains(&(r.start.as_str(), r.target.as_str())))
        .collect()
}

/// Optimize one relation layer
///
/// Conditions and responses are transitively reduced and filtered against the excludes.
/// Includes and excludes are kept unchanged.
pub fn optimize_relation_set<'a, I>(relations: I) -> Vec<Relation>
where
    I: IntoIterator<Item = &'a Relation>,
{
    let mut by_type: BTreeMap<RelationType, Vec<&Relation>> = BTreeMap::new();
    for r in relations {
        by_type.entry(r.relation_type).or_default().push(r);
    }
    let of_type = |relation_type: RelationType| -> Vec<&Relation> {
        by_type.get(&relation_type).cloned().unwrap_or_default()
    };
    let excludes: Vec<Relation> = of_type(RelationType::Exclude)
        .into_iter()
        .cloned()
        .collect();
    let conditions =
        filter_excluded_relations(transitive_reduction(of_type(RelationType::Condition)), &excludes);
    let responses =
        filter_excluded_relations(transitive_reduction(of_type(RelationType::Response)), &excludes);

    let mut ret: Vec<Relation> = conditions
        .into_iter()
        .chain(responses)
        .chain(of_type(RelationType::Include).into_iter().cloned())
        .chain(excludes)
        .collect();
    ret.sort();
    ret
}

/// Optimize the top-level layer, every object and the synchronizing relations
pub fn optimize_relations(graph: &mut OcDcrGraph) {
    let top_level = optimize_relation_set(graph.top_level().relations());
    graph.top_level_mut().set_relations(top_level);

    let mut object_types: Vec<String> = graph.objects().keys().cloned().collect();
    object_types.sort();
    for object_type in object_types {
        if let Some(object) = graph.object_mut(&object_type) {
            let relations = optimize_relation_set(object.graph().relations());
            object.graph_mut().set_relations(relations);
        }
    }

    let sync = optimize_relation_set(graph.sync_relations());
    graph.set_sync_relations(sync);
}

/// Keep only synchronizing relations between derived entities
///
/// `None` means every pair of object types is derived and nothing is removed. Otherwise a
/// synchronizing relation between two objects is kept only if their types are listed as a pair
/// (in either order). Relations touching the top level are always kept.
pub fn filter_for_derived_entities(
    graph: &mut OcDcrGraph,
    derived_entities: Option<&[(String, String)]>,
) {
    let Some(derived_entities) = derived_entities else {
        return;
    };
    let object_type_of = |graph: &OcDcrGraph, event: &str| match graph.location_of(event) {
        Some(EventLocation::Object(t)) => Some(t.clone()),
        _ => None,
    };
    let to_remove: Vec<Relation> = graph
        .sync_relations()
        .filter(|r| {
            match (
                object_type_of(graph, r.start.as_str()),
                object_type_of(graph, r.target.as_str()),
            ) {
                (Some(s), Some(t)) => !derived_entities
                    .iter()
                    .any(|(a, b)| (*a == s && *b == t) || (*a == t && *b == s)),
                _ => false,
            }
        })
        .cloned()
        .collect();
    if !to_remove.is_empty() {
        tracing::debug!(
            "Removing {} synchronizing relations between non-derived entities",
            to_remove.len()
        );
    }
    graph.retain_sync_relations(|r| !to_remove.contains(r));
}

/// All (transitive) descendants of every group
pub fn build_group_descendants(
    nestedgroups: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    nestedgroups
        .keys()
        .map(|group| {
            let mut visited: BTreeSet<String> = BTreeSet::new();
            let mut stack: Vec<&String> = nestedgroups.get(group).into_iter().flatten().collect();
            while let Some(current) = stack.pop() {
                if current == group || !visited.insert(current.clone()) {
                    continue;
                }
                stack.extend(nestedgroups.get(current).into_iter().flatten());
            }
            (group.clone(), visited)
        })
        .collect()
}

/// All (transitive) ancestor groups of every nested element
pub fn build_reverse_ancestors(
    nested_map: &BTreeMap<String, String>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut ret: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (child, parent) in nested_map {
        let ancestors = ret.entry(child.clone()).or_default();
        let mut current = Some(parent);
        while let Some(c) = current {
            if c == child || !ancestors.insert(c.clone()) {
                break;
            }
            current = nested_map.get(c);
        }
    }
    ret
}

/// Whether `source -> target` (in dictionary direction) is implied by a group-level entry
///
/// This is the case if an ancestor of the source relates to the target, the source relates to
/// an ancestor of the target, or a group containing the source relates to a group containing
/// the target.
pub fn is_redundant_relation(
    source: &str,
    target: &str,
    rel_dict: &BTreeMap<String, BTreeSet<String>>,
    reverse_ancestors: &BTreeMap<String, BTreeSet<String>>,
    group_descendants: &BTreeMap<String, BTreeSet<String>>,
) -> bool {
    let related = |s: &str, t: &str| rel_dict.get(s).is_some_and(|targets| targets.contains(t));
    let ancestors = |e: &str| reverse_ancestors.get(e).into_iter().flatten();

    if ancestors(source).any(|a| related(a, target)) {
        return true;
    }
    if ancestors(target).any(|a| related(source, a)) {
        return true;
    }
    group_descendants
        .iter()
        .filter(|(_, descs)| descs.contains(source))
        .any(|(source_group, _)| {
            group_descendants
                .iter()
                .filter(|(_, descs)| descs.contains(target))
                .any(|(target_group, _)| related(source_group, target_group))
        })
}

/// Remove relations of a nested template which are implied by relations of their groups
///
/// Ancestors are taken from `nestedgroupsMap` and `nestedgroups`. Entries whose target set
/// becomes empty are dropped.
pub fn filter_template_relations(mut template: DcrTemplate) -> DcrTemplate {
    let mut nested_map = template.nestedgroups_map.clone();
    for (group, children) in &template.nestedgroups {
        for c in children {
            nested_map
                .entry(c.clone())
                .or_insert_with(|| group.clone());
        }
    }
    let group_descendants = build_group_descendants(&template.nestedgroups);
    let reverse_ancestors = build_reverse_ancestors(&nested_map);

    for relation_type in ALL_RELATION_TYPES {
        let rel_dict = template.relation_dict(*relation_type);
        let filtered: BTreeMap<String, BTreeSet<String>> = rel_dict
            .iter()
            .map(|(source, targets)| {
                let kept: BTreeSet<String> = targets
                    .iter()
                    .filter(|target| {
                        !is_redundant_relation(
                            source,
                            target,
                            rel_dict,
                            &reverse_ancestors,
                            &group_descendants,
                        )
                    })
                    .cloned()
                    .collect();
                (source.clone(), kept)
            })
            .filter(|(_, kept)| !kept.is_empty())
            .collect();
        *template.relation_dict_mut(*relation_type) = filtered;
    }
    template
}

/// Split relations into synchronizing (at least one quantifier) and one-to-one relations
pub fn get_relation_partition<'a, I>(relations: I) -> (Vec<Relation>, Vec<Relation>)
where
    I: IntoIterator<Item = &'a Relation>,
{
    let (one_to_one, sync): (Vec<Relation>, Vec<Relation>) = relations
        .into_iter()
        .cloned()
        .partition(Relation::is_one_to_one);
    (sync, one_to_one)
}

/// Nest the one-to-one relations of an object and rebuild it
fn nest_object(object: &OcDcrObject) -> Result<OcDcrObject, DcrGraphError> {
    let (sync, one_to_one) = get_relation_partition(object.graph().relations());
    let mut one_to_one_graph = object.to_dcr();
    one_to_one_graph.set_relations(one_to_one.iter().cloned());

    let mut template = filter_template_relations(apply_nested(&one_to_one_graph));
    let new_groups: Vec<String> = template
        .nestedgroups
        .keys()
        .filter(|g| !object.graph().contains_event(g))
        .cloned()
        .collect();
    for group in new_groups {
        template.rename_event(&group, &format!("{group}_{}", object.object_type()));
    }

    let mut nested = OcDcrObject::new(
        object.spawn().cloned(),
        object.object_type(),
        DcrGraph::from_template(&template)?,
    );
    for r in &one_to_one {
        if nested
            .graph()
            .get_relation(r.start.as_str(), r.target.as_str(), r.relation_type)
            .is_some()
        {
            nested.add_relation(
                &r.start,
                &r.target,
                r.relation_type,
                r.quantifier_head,
                r.quantifier_tail,
            )?;
        }
    }
    for r in &sync {
        nested.add_relation(
            &r.start,
            &r.target,
            r.relation_type,
            r.quantifier_head,
            r.quantifier_tail,
        )?;
    }
    Ok(nested)
}

/// Discover nested groups inside every object subgraph
///
/// Only one-to-one relations are considered for nesting; new groups are named
/// `{group}_{object type}`. Synchronizing (quantified) relations of the object are re-added
/// afterwards.
pub fn create_nestings_for_subgraphs(graph: &mut OcDcrGraph) -> Result<(), DcrGraphError> {
    let mut objects: Vec<&OcDcrObject> = graph.objects().values().collect();
    objects.sort_by(|a, b| a.object_type().cmp(b.object_type()));
    let nested: Vec<Result<OcDcrObject, DcrGraphError>> =
        objects.into_par_iter().map(nest_object).collect();
    for object in nested {
        graph.add_object(object?);
    }
    graph.update_activities();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process_models::dcr::Event;

    fn rel(s: &str, t: &str, ty: RelationType) -> Relation {
        Relation::new(Event::new(s), Event::new(t), ty)
    }

    fn pairs(relations: &[Relation]) -> BTreeSet<(String, String)> {
        relations
            .iter()
            .map(|r| (r.start.to_string(), r.target.to_string()))
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_transitive_reduction_chain() {
        let relations = vec![
            rel("A", "B", RelationType::Condition),
            rel("B", "C", RelationType::Condition),
            rel("A", "C", RelationType::Condition),
        ];
        let reduced = transitive_reduction(&relations);
        assert_eq!(
            pairs(&reduced),
            BTreeSet::from([("A".into(), "B".into()), ("B".into(), "C".into())])
        );
        assert!(transitive_reduction(&Vec::<Relation>::new()).is_empty());
    }

    #[test]
    fn test_transitive_reduction_keeps_cycles_and_quantifiers() {
        let relations = vec![
            Relation::with_quantifiers(
                Event::new("A"),
                Event::new("B"),
                RelationType::Response,
                true,
                false,
            ),
            rel("B", "A", RelationType::Response),
            rel("C", "C", RelationType::Response),
        ];
        let reduced = transitive_reduction(&relations);
        assert_eq!(reduced.len(), 3);
        assert!(reduced.contains(&relations[0]));
        assert!(reduced[0].quantifier_head);
    }

    #[test]
    fn test_transitive_reduction_idempotent() {
        let relations = vec![
            rel("A", "B", RelationType::Condition),
            rel("B", "C", RelationType::Condition),
            rel("C", "D", RelationType::Condition),
            rel("A", "D", RelationType::Condition),
            rel("B", "D", RelationType::Condition),
        ];
        let once = transitive_reduction(&relations);
        let twice = transitive_reduction(&once);
        assert_eq!(pairs(&once), pairs(&twice));
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_transitive_reduction_cycle_next_to_chain() {
        let relations: Vec<Relation> = [
            ("A", "B"),
            ("B", "C"),
            ("A", "C"),
            ("C", "A"),
            ("X", "Y"),
            ("Y", "Z"),
            ("X", "Z"),
            ("Q", "Q"),
        ]
        .into_iter()
        .map(|(s, t)| rel(s, t, RelationType::Condition))
        .collect();
        let mut reduced: Vec<String> = transitive_reduction(&relations)
            .iter()
            .map(|r| format!("{}->{}", r.start, r.target))
            .collect();
        reduced.sort();
        assert_eq!(
            reduced,
            vec!["A->B", "B->C", "C->A", "Q->Q", "X->Y", "Y->Z"]
        );
    }

    #[test]
    fn test_filter_excluded_relations() {
        let relations = vec![
            rel("A", "B", RelationType::Condition),
            rel("B", "C", RelationType::Condition),
        ];
        let excludes = vec![rel("A", "B", RelationType::Exclude)];
        let filtered = filter_excluded_relations(relations.clone(), &excludes);
        assert_eq!(filtered, vec![relations[1].clone()]);
        assert_eq!(filter_excluded_relations(relations.clone(), &[]), relations);
    }

    #[test]
    fn test_optimize_relation_set_keeps_includes_and_excludes() {
        let relations = vec![
            rel("A", "B", RelationType::Response),
            rel("B", "C", RelationType::Response),
            rel("A", "C", RelationType::Response),
            rel("A", "C", RelationType::Include),
            rel("A", "B", RelationType::Exclude),
            rel("B", "C", RelationType::Exclude),
            rel("A", "C", RelationType::Exclude),
        ];
        let optimized = optimize_relation_set(&relations);
        let of = |ty: RelationType| {
            optimized
                .iter()
                .filter(|r| r.relation_type == ty)
                .count()
        };
        assert_eq!(of(RelationType::Response), 0);
        assert_eq!(of(RelationType::Include), 1);
        assert_eq!(of(RelationType::Exclude), 3);
    }

    fn synced_graph() -> OcDcrGraph {
        let mut g = OcDcrGraph::new();
        g.add_event("place order", None).unwrap();
        g.add_event("create invoice", None).unwrap();
        for (t, spawn) in [("order", "place order"), ("invoice", "create invoice")] {
            g.add_object(OcDcrObject::new(Some(Event::new(spawn)), t, DcrGraph::new()));
        }
        g.add_event("pay order", Some("order")).unwrap();
        g.add_event("send invoice", Some("invoice")).unwrap();
        g.add_relation("pay order", "send invoice", RelationType::Condition, true, true)
            .unwrap();
        g.add_relation("place order", "send invoice", RelationType::Response, false, true)
            .unwrap();
        g
    }

    #[test]
    fn test_filter_for_derived_entities() {
        let mut g = synced_graph();
        filter_for_derived_entities(&mut g, None);
        assert_eq!(g.sync_relations().count(), 2);

        let mut g = synced_graph();
        filter_for_derived_entities(&mut g, Some(&[][..]));
        assert_eq!(g.sync_relations().count(), 1);
        assert!(g
            .get_relation("place order", "send invoice", RelationType::Response)
            .is_some());

        let mut g = synced_graph();
        let derived = vec![("invoice".to_string(), "order".to_string())];
        filter_for_derived_entities(&mut g, Some(derived.as_slice()));
        assert_eq!(g.sync_relations().count(), 2);
    }

    #[test]
    fn test_optimize_relations_on_all_layers() {
        let mut g = synced_graph();
        g.add_event("ship order", Some("order")).unwrap();
        g.add_event("close order", Some("order")).unwrap();
        for (s, t) in [
            ("pay order", "ship order"),
            ("ship order", "close order"),
            ("pay order", "close order"),
        ] {
            g.add_relation(s, t, RelationType::Condition, false, false)
                .unwrap();
        }
        g.add_relation("send invoice", "pay order", RelationType::Exclude, true, true)
            .unwrap();
        g.add_relation("send invoice", "pay order", RelationType::Response, true, true)
            .unwrap();
        optimize_relations(&mut g);
        assert!(g
            .get_relation("pay order", "close order", RelationType::Condition)
            .is_none());
        assert!(g
            .get_relation("ship order", "close order", RelationType::Condition)
            .is_some());
        assert!(g
            .get_relation("send invoice", "pay order", RelationType::Response)
            .is_none());
        assert!(g
            .get_relation("send invoice", "pay order", RelationType::Exclude)
            .is_some());
    }

    #[test]
    fn test_filter_template_relations() {
        let mut template = DcrTemplate::default();
        template.events = set(&["A", "B", "C", "G1", "G2"]);
        template
            .nestedgroups
            .insert("G1".to_string(), set(&["A", "G2"]));
        template.nestedgroups.insert("G2".to_string(), set(&["B"]));
        for s in ["G1", "A", "B"] {
            template.add_relation(s, "C", RelationType::Exclude);
        }
        let filtered = filter_template_relations(template);
        assert_eq!(
            filtered.excludes_to,
            BTreeMap::from([("G1".to_string(), set(&["C"]))])
        );
    }

    #[test]
    fn test_filter_template_relations_target_keyed() {
        let mut template = DcrTemplate::default();
        template.events = set(&["A", "B", "C", "Group1"]);
        template
            .nestedgroups
            .insert("Group1".to_string(), set(&["A", "B"]));
        for s in ["A", "B", "Group1"] {
            template.add_relation(s, "C", RelationType::Condition);
        }
        let filtered = filter_template_relations(template);
        assert_eq!(
            filtered.conditions_for,
            BTreeMap::from([("C".to_string(), set(&["Group1"]))])
        );
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let nestedgroups = BTreeMap::from([
            ("G1".to_string(), set(&["A", "G2"])),
            ("G2".to_string(), set(&["B"])),
        ]);
        let descendants = build_group_descendants(&nestedgroups);
        assert_eq!(descendants["G1"], set(&["A", "B", "G2"]));
        assert_eq!(descendants["G2"], set(&["B"]));

        let nested_map = BTreeMap::from([
            ("A".to_string(), "G1".to_string()),
            ("G2".to_string(), "G1".to_string()),
            ("B".to_string(), "G2".to_string()),
        ]);
        let ancestors = build_reverse_ancestors(&nested_map);
        assert_eq!(ancestors["B"], set(&["G1", "G2"]));
        assert_eq!(ancestors["A"], set(&["G1"]));
    }

    #[test]
    fn test_relation_partition() {
        let relations = vec![
            rel("A", "B", RelationType::Condition),
            Relation::with_quantifiers(
                Event::new("A"),
                Event::new("C"),
                RelationType::Condition,
                false,
                true,
            ),
            Relation::with_quantifiers(
                Event::new("B"),
                Event::new("C"),
                RelationType::Response,
                true,
                true,
            ),
        ];
        let (sync, one_to_one) = get_relation_partition(&relations);
        assert_eq!(sync.len(), 2);
        assert_eq!(one_to_one, vec![relations[0].clone()]);
    }

    #[test]
    fn test_create_nestings_for_subgraphs() {
        let mut g = OcDcrGraph::new();
        g.add_event("place order", None).unwrap();
        g.add_object(OcDcrObject::new(
            Some(Event::new("place order")),
            "order",
            DcrGraph::new(),
        ));
        for e in ["pay order", "cancel order", "close order", "archive order"] {
            g.add_event(e, Some("order")).unwrap();
        }
        g.add_relation("pay order", "close order", RelationType::Exclude, false, false)
            .unwrap();
        g.add_relation("cancel order", "close order", RelationType::Exclude, false, false)
            .unwrap();
        g.add_relation("pay order", "archive order", RelationType::Response, true, true)
            .unwrap();

        create_nestings_for_subgraphs(&mut g).unwrap();
        let order = g.object("order").unwrap();
        assert_eq!(order.spawn().map(Event::as_str), Some("place order"));
        assert!(order.graph().is_group("Group1_order"));
        assert_eq!(
            order.graph().parent_of("pay order").map(Event::as_str),
            Some("Group1_order")
        );
        assert!(order
            .graph()
            .get_relation("Group1_order", "close order", RelationType::Exclude)
            .is_some());
        assert!(order
            .graph()
            .get_relation("pay order", "close order", RelationType::Exclude)
            .is_none());
        let sync = order
            .graph()
            .get_relation("pay order", "archive order", RelationType::Response)
            .unwrap();
        assert!(sync.is_many_to_many());
        assert_eq!(
            g.location_of("Group1_order"),
            Some(&EventLocation::Object("order".to_string()))
        );
    }
}
