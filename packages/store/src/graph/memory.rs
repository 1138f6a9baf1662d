//! In-memory graph provider.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests and ephemeral stores.
//!
//! Nodes live in a [`BTreeMap`] keyed by ID so label scans come back in ID
//! order. Edges are kept in creation order in a `Vec`; lookups scan it.
//!
//! A write transaction runs against a copy of the state taken under the
//! write lock. The copy replaces the live state only if the closure returns
//! `Ok`, so a failed transaction leaves no trace. Every write therefore costs
//! a clone of the whole graph; this backend is meant for small graphs.
//! Use [`SqliteGraph`](super::sqlite::SqliteGraph) for anything larger.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use serde_json::Value;

use super::{Direction, Edge, GraphProvider, GraphRead, GraphWrite, Node, WriteWork};
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Inner {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
}

impl GraphRead for Inner {
    fn node(&self, id: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.nodes.get(id).cloned())
    }

    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.label == label)
            .cloned()
            .collect())
    }

    fn find_nodes(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.label == label && n.properties.get(key) == Some(value))
            .cloned()
            .collect())
    }

    fn neighbours(
        &self,
        id: &str,
        rel: &str,
        direction: Direction,
    ) -> Result<Vec<Node>, StoreError> {
        let result = self
            .edges
            .iter()
            .filter(|e| e.rel == rel)
            .filter_map(|e| match direction {
                Direction::Outgoing if e.from == id => Some(e.to.as_str()),
                Direction::Incoming if e.to == id => Some(e.from.as_str()),
                _ => None,
            })
            .filter_map(|other| self.nodes.get(other))
            .cloned()
            .collect();
        Ok(result)
    }

    fn edges_by_rel(&self, rel: &str) -> Result<Vec<Edge>, StoreError> {
        Ok(self.edges.iter().filter(|e| e.rel == rel).cloned().collect())
    }
}

impl GraphWrite for Inner {
    fn create_node(&mut self, node: Node) -> Result<(), StoreError> {
        if self.nodes.contains_key(&node.id) {
            return Err(StoreError::Conflict(format!("node {} already exists", node.id)));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn create_edge(&mut self, edge: Edge) -> Result<(), StoreError> {
        for endpoint in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(StoreError::NotFound(format!("node {endpoint}")));
            }
        }
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    fn delete_node(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.nodes.remove(id).is_none() {
            return Ok(false);
        }
        self.edges.retain(|e| e.from != id && e.to != id);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// MemoryGraph
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`GraphProvider`].
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of nodes currently stored.
    pub fn node_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().map_err(|_| poisoned())?.nodes.len())
    }

    /// Number of edges currently stored.
    pub fn edge_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().map_err(|_| poisoned())?.edges.len())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("memory graph lock poisoned".into())
}

/// A read session holding the shared lock for its lifetime.
struct ReadSession<'a>(RwLockReadGuard<'a, Inner>);

impl GraphRead for ReadSession<'_> {
    fn node(&self, id: &str) -> Result<Option<Node>, StoreError> {
        self.0.node(id)
    }

    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>, StoreError> {
        self.0.nodes_by_label(label)
    }

    fn find_nodes(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>, StoreError> {
        self.0.find_nodes(label, key, value)
    }

    fn neighbours(
        &self,
        id: &str,
        rel: &str,
        direction: Direction,
    ) -> Result<Vec<Node>, StoreError> {
        self.0.neighbours(id, rel, direction)
    }

    fn edges_by_rel(&self, rel: &str) -> Result<Vec<Edge>, StoreError> {
        self.0.edges_by_rel(rel)
    }
}

impl GraphProvider for MemoryGraph {
    fn read_session(&self) -> Result<Box<dyn GraphRead + '_>, StoreError> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        Ok(Box::new(ReadSession(guard)))
    }

    fn run_write(&self, work: &mut WriteWork<'_>) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        let mut draft = guard.clone();
        work(&mut draft)?;
        *guard = draft;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphProviderExt;

    fn seeded() -> MemoryGraph {
        let g = MemoryGraph::new();
        g.write_transaction(|tx| {
            tx.create_node(Node::new("m1", "Manifestation"))?;
            tx.create_node(Node::new("s1", "Span").with("start", 0).with("end", 5))?;
            tx.create_node(Node::new("s2", "Span").with("start", 5).with("end", 9))?;
            tx.create_edge(Edge::new("s1", "SPAN_OF", "m1"))?;
            tx.create_edge(Edge::new("s2", "SPAN_OF", "m1"))
        })
        .unwrap();
        g
    }

    #[test]
    fn create_and_read_back() {
        let g = seeded();
        let session = g.read_session().unwrap();
        let n = session.node("s1").unwrap().unwrap();
        assert_eq!(n.int_prop("end").unwrap(), 5);
        assert_eq!(session.nodes_by_label("Span").unwrap().len(), 2);
        let incoming = session.neighbours("m1", "SPAN_OF", Direction::Incoming).unwrap();
        let ids: Vec<&str> = incoming.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn duplicate_node_conflicts() {
        let g = seeded();
        let err = g
            .write_transaction(|tx| tx.create_node(Node::new("m1", "Manifestation")))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn edge_to_missing_node_is_not_found() {
        let g = seeded();
        let err = g
            .write_transaction(|tx| tx.create_edge(Edge::new("s1", "SPAN_OF", "nope")))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let g = seeded();
        let result: Result<(), _> = g.write_transaction(|tx| {
            tx.create_node(Node::new("s3", "Span"))?;
            Err(StoreError::NotFound("type node".into()))
        });
        assert!(result.is_err());
        assert!(g.read_session().unwrap().node("s3").unwrap().is_none());
        assert_eq!(g.node_count().unwrap(), 3);
    }

    #[test]
    fn delete_detaches_edges() {
        let g = seeded();
        assert!(g.write_transaction(|tx| tx.delete_node("s1")).unwrap());
        assert!(!g.write_transaction(|tx| tx.delete_node("s1")).unwrap());
        assert_eq!(g.edge_count().unwrap(), 1);
    }

    #[test]
    fn find_nodes_matches_property() {
        let g = MemoryGraph::new();
        g.write_transaction(|tx| {
            tx.create_node(Node::new("t1", "NoteType").with("name", "durchen"))?;
            tx.create_node(Node::new("t2", "NoteType").with("name", "other"))
        })
        .unwrap();
        let found = g
            .read_session()
            .unwrap()
            .find_nodes("NoteType", "name", &Value::from("durchen"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "t1");
    }
}
