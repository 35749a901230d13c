use super::{DcrGraph, OcDcrGraph, OcDcrObject, Relation, RelationType};

/// Graphs whose relations can be filtered
///
/// The predicate receives every relation together with whether it is a synchronizing relation
/// of an [`OcDcrGraph`].
pub trait RelationFiltering: Clone {
    /// Keep only relations for which the predicate holds
    fn retain_relations_by<F: FnMut(&Relation, bool) -> bool>(&mut self, f: F);
}

impl RelationFiltering for DcrGraph {
    fn retain_relations_by<F: FnMut(&Relation, bool) -> bool>(&mut self, mut f: F) {
        self.retain_relations(|r| f(r, false));
    }
}

impl RelationFiltering for OcDcrObject {
    fn retain_relations_by<F: FnMut(&Relation, bool) -> bool>(&mut self, f: F) {
        self.graph_mut().retain_relations_by(f);
    }
}

impl RelationFiltering for OcDcrGraph {
    fn retain_relations_by<F: FnMut(&Relation, bool) -> bool>(&mut self, mut f: F) {
        self.top_level_mut().retain_relations(|r| f(r, false));
        let types: Vec<String> = self.objects().keys().cloned().collect();
        for t in types {
            if let Some(o) = self.object_mut(&t) {
                o.retain_relations_by(&mut f);
            }
        }
        self.retain_sync_relations(|r| f(r, true));
    }
}

/// Copy of the graph keeping only relations of the given types
pub fn filter_by_relation_type<G: RelationFiltering>(graph: &G, types: &[RelationType]) -> G {
    let mut g = graph.clone();
    g.retain_relations_by(|r, _| types.contains(&r.relation_type));
    g
}

/// Copy of the graph without many-to-many relations, except for relations of the given types
///
/// Synchronizing relations are only kept if their type is listed.
pub fn filter_many_to_many<G: RelationFiltering>(graph: &G, keep_types: &[RelationType]) -> G {
    let mut g = graph.clone();
    g.retain_relations_by(|r, is_sync| {
        keep_types.contains(&r.relation_type) || (!is_sync && !r.is_many_to_many())
    });
    g
}

/// Copy of the graph without any quantified relations, except for relations of the given types
pub fn filter_one_to_many<G: RelationFiltering>(graph: &G, keep_types: &[RelationType]) -> G {
    let mut g = graph.clone();
    g.retain_relations_by(|r, _| keep_types.contains(&r.relation_type) || r.is_one_to_one());
    g
}
