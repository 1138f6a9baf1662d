//! Relationship inference over the expression lineage graph.
//!
//! [`build_adjacency_map`] reads every `Expression` node and every
//! `TRANSLATION_OF` / `COMMENTARY_OF` edge once; the traversal itself runs in
//! memory in `spangraph::relation`.

use std::sync::Arc;

use spangraph::{
    infer_relation_dict, Adjacency, AdjacencyMap, EdgeDirection, EdgeType, RelationDict,
    RelationGroups,
};

use crate::error::StoreError;
use crate::graph::{blocking, GraphProvider, GraphRead};
use crate::schema::labels;

/// Build the expression adjacency map from the graph.
///
/// Every expression gets an entry, even one with no lineage edges. Each edge
/// `a -[TRANSLATION_OF]-> b` is recorded twice: as `out` on `a` and as `in`
/// on `b`. Edges touching non-expression nodes are ignored.
pub fn build_adjacency_map<S: GraphRead + ?Sized>(session: &S) -> Result<AdjacencyMap, StoreError> {
    let mut map: AdjacencyMap = session
        .nodes_by_label(labels::EXPRESSION)?
        .into_iter()
        .map(|n| (n.id, Vec::new()))
        .collect();

    for edge_type in EdgeType::ALL {
        for edge in session.edges_by_rel(edge_type.as_str())? {
            if !(map.contains_key(&edge.from) && map.contains_key(&edge.to)) {
                continue;
            }
            if let Some(list) = map.get_mut(&edge.from) {
                list.push(Adjacency::new(&edge.to, *edge_type, EdgeDirection::Out));
            }
            if let Some(list) = map.get_mut(&edge.to) {
                list.push(Adjacency::new(&edge.from, *edge_type, EdgeDirection::In));
            }
        }
    }
    Ok(map)
}

/// Infers how expressions relate to one another.
#[derive(Clone)]
pub struct RelationshipService {
    provider: Arc<dyn GraphProvider>,
}

impl RelationshipService {
    pub fn new(provider: Arc<dyn GraphProvider>) -> Self {
        Self { provider }
    }

    /// Snapshot of the adjacency map.
    pub async fn adjacency_map(&self) -> Result<AdjacencyMap, StoreError> {
        let provider = Arc::clone(&self.provider);
        blocking(move || {
            let session = provider.read_session()?;
            build_adjacency_map(&*session)
        })
        .await
    }

    /// Every expression reachable from `expression_id`, classified, in
    /// discovery order. Fails with [`StoreError::NotFound`] if no such
    /// expression exists.
    pub async fn relation_dict(&self, expression_id: &str) -> Result<RelationDict, StoreError> {
        let map = self.adjacency_map().await?;
        let dict = infer_relation_dict(&map, expression_id)?;
        tracing::debug!(
            root = %expression_id,
            expressions = map.len(),
            reached = dict.len(),
            "inferred relation dict"
        );
        Ok(dict)
    }

    /// Group every expression reachable from `expression_id` by its relation
    /// to it. The root and unclassified expressions are left out.
    pub async fn infer(&self, expression_id: &str) -> Result<RelationGroups, StoreError> {
        Ok(self.relation_dict(expression_id).await?.into_groups())
    }
}
