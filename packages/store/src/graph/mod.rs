//! Property graph session/transaction provider.
//!
//! The [`GraphProvider`] trait is the contract between repositories and
//! persistence. Reads go through a [`GraphRead`] session; writes run a
//! closure against a [`GraphWrite`] transaction that commits when the
//! closure returns `Ok` and rolls back when it returns `Err`. Lock
//! contention is retried inside the provider according to its
//! [`RetryPolicy`]; the closure may therefore run more than once.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryGraph`] | Tests, ephemeral stores |
//! | [`SqliteGraph`] | Production; durable single-file database |
//!
//! [`MemoryGraph`]: memory::MemoryGraph
//! [`SqliteGraph`]: sqlite::SqliteGraph

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use serde_json::Value;

use crate::config::{RetryPolicy, StoreConfig};
use crate::error::StoreError;

/// Node properties, stored as a JSON object.
pub type Properties = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Node / Edge
// ---------------------------------------------------------------------------

/// A labelled node. Every node has exactly one label.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Properties::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn str_prop(&self, key: &str) -> Result<&str, StoreError> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::malformed(format!("{} {} has no string {key:?}", self.label, self.id))
            })
    }

    pub fn int_prop(&self, key: &str) -> Result<i64, StoreError> {
        self.properties
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                StoreError::malformed(format!("{} {} has no integer {key:?}", self.label, self.id))
            })
    }
}

/// A directed, typed relationship `from -[rel]-> to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: String,
    pub rel: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, rel: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            rel: rel.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges from the given node.
    Outgoing,
    /// Follow edges into the given node.
    Incoming,
}

// ---------------------------------------------------------------------------
// Session traits
// ---------------------------------------------------------------------------

/// Read access to the graph. Result lists are in a stable order: nodes by
/// ID, edges and neighbours by creation order.
pub trait GraphRead {
    fn node(&self, id: &str) -> Result<Option<Node>, StoreError>;

    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>, StoreError>;

    /// Nodes with `label` whose property `key` equals `value`.
    fn find_nodes(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>, StoreError>;

    /// Nodes one `rel` edge away from `id` in `direction`.
    fn neighbours(&self, id: &str, rel: &str, direction: Direction)
        -> Result<Vec<Node>, StoreError>;

    fn edges_by_rel(&self, rel: &str) -> Result<Vec<Edge>, StoreError>;

    /// The node with `id`, but only if it carries `label`.
    fn node_with_label(&self, id: &str, label: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.node(id)?.filter(|n| n.label == label))
    }
}

/// Write access inside a transaction.
pub trait GraphWrite: GraphRead {
    /// Returns [`StoreError::Conflict`] if a node with the same ID exists.
    fn create_node(&mut self, node: Node) -> Result<(), StoreError>;

    /// Returns [`StoreError::NotFound`] if either endpoint is missing.
    /// Creating an edge that already exists is a no-op.
    fn create_edge(&mut self, edge: Edge) -> Result<(), StoreError>;

    /// Delete a node and every edge touching it. Returns `false` if the node
    /// did not exist.
    fn delete_node(&mut self, id: &str) -> Result<bool, StoreError>;
}

/// Unit of work passed to [`GraphProvider::run_write`].
pub type WriteWork<'a> = dyn FnMut(&mut dyn GraphWrite) -> Result<(), StoreError> + 'a;

/// A source of read sessions and managed write transactions.
///
/// Implementations must be `Send + Sync + 'static` so they can be held in an
/// `Arc<dyn GraphProvider>` and used from blocking worker threads.
pub trait GraphProvider: Send + Sync + 'static {
    /// Open a non-exclusive read session.
    fn read_session(&self) -> Result<Box<dyn GraphRead + '_>, StoreError>;

    /// Run `work` in one atomic write transaction, retrying on
    /// [`StoreError::Transient`].
    fn run_write(&self, work: &mut WriteWork<'_>) -> Result<(), StoreError>;
}

/// Value-returning wrapper around [`GraphProvider::run_write`].
pub trait GraphProviderExt {
    fn write_transaction<T>(
        &self,
        work: impl FnMut(&mut dyn GraphWrite) -> Result<T, StoreError>,
    ) -> Result<T, StoreError>;
}

impl<P: GraphProvider + ?Sized> GraphProviderExt for P {
    fn write_transaction<T>(
        &self,
        mut work: impl FnMut(&mut dyn GraphWrite) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut out = None;
        self.run_write(&mut |tx: &mut dyn GraphWrite| {
            out = Some(work(tx)?);
            Ok(())
        })?;
        out.ok_or_else(|| StoreError::Internal("write transaction produced no result".into()))
    }
}

/// Run `attempt` until it succeeds, fails permanently, or `policy` is
/// exhausted.
pub(crate) fn with_retries<T>(
    policy: &RetryPolicy,
    mut attempt: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut retries = 0;
    loop {
        match attempt() {
            Err(e) if e.is_transient() && retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay(retries);
                tracing::warn!(
                    error = %e,
                    retry = retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "write transaction hit a transient error; retrying"
                );
                std::thread::sleep(delay);
            }
            other => return other,
        }
    }
}

/// Open the provider selected by `config`.
pub fn open_provider(config: &StoreConfig) -> Result<Arc<dyn GraphProvider>, StoreError> {
    match &config.db_path {
        Some(path) => {
            tracing::info!("graph store: SQLite at {path}");
            Ok(Arc::new(sqlite::SqliteGraph::open(path, config.retry)?))
        }
        None => {
            tracing::info!("graph store: in-memory (data will not survive exit)");
            Ok(Arc::new(memory::MemoryGraph::new()))
        }
    }
}

/// Run blocking provider work on the tokio blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Internal(format!("task join error: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn retries_transient_errors_then_succeeds() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(0),
        };
        let calls = Cell::new(0);
        let result = with_retries(&policy, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(StoreError::Transient("busy".into()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(0),
        };
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retries(&policy, || {
            calls.set(calls.get() + 1);
            Err(StoreError::Transient("busy".into()))
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retries(&policy, || {
            calls.set(calls.get() + 1);
            Err(StoreError::NotFound("x".into()))
        });
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn node_props_report_missing_keys() {
        let n = Node::new("a", "Span").with("start", 3);
        assert_eq!(n.int_prop("start").unwrap(), 3);
        assert!(matches!(n.int_prop("end"), Err(StoreError::Internal(_))));
        assert!(n.str_prop("start").is_err());
    }
}
