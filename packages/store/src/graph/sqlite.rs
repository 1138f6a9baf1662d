//! SQLite-backed graph provider.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. Callers are expected to invoke
//! the provider from a blocking context (repositories use
//! `tokio::task::spawn_blocking`).
//!
//! # Schema
//!
//! - `nodes`: one row per node: id, label, JSON-encoded properties.
//! - `edges`: one row per `(src, rel, dst)` triple. `seq` preserves creation
//!   order. Both endpoints reference `nodes` with `ON DELETE CASCADE`, so
//!   deleting a node detaches it.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use super::{
    with_retries, Direction, Edge, GraphProvider, GraphRead, GraphWrite, Node, Properties,
    WriteWork,
};
use crate::config::RetryPolicy;
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS nodes (
    id          TEXT PRIMARY KEY,
    label       TEXT NOT NULL,
    properties  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);

CREATE TABLE IF NOT EXISTS edges (
    seq  INTEGER PRIMARY KEY AUTOINCREMENT,
    src  TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    rel  TEXT NOT NULL,
    dst  TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    UNIQUE (src, rel, dst)
);
CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst, rel);
CREATE INDEX IF NOT EXISTS idx_edges_rel ON edges(rel);
";

// ---------------------------------------------------------------------------
// SqliteGraph
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`GraphProvider`].
///
/// Holds a single database connection protected by a `Mutex`; sessions and
/// transactions hold the lock for their lifetime.
pub struct SqliteGraph {
    conn: Arc<Mutex<Connection>>,
    retry: RetryPolicy,
}

impl SqliteGraph {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str, retry: RetryPolicy) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_err)?;
        Self::init(conn, retry)
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_err)?;
        Self::init(conn, RetryPolicy::default())
    }

    fn init(conn: Connection, retry: RetryPolicy) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(map_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retry,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("sqlite connection lock poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::Transient(e.to_string())
        }
        _ => StoreError::Internal(e.to_string()),
    }
}

fn map_json_err(e: serde_json::Error) -> StoreError {
    StoreError::Internal(format!("JSON error: {e}"))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation)
}

// ---------------------------------------------------------------------------
// Queries shared by read sessions and write transactions
// ---------------------------------------------------------------------------

type RawNode = (String, String, String);

fn decode((id, label, properties): RawNode) -> Result<Node, StoreError> {
    let properties: Properties = serde_json::from_str(&properties).map_err(map_json_err)?;
    Ok(Node {
        id,
        label,
        properties,
    })
}

fn raw_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawNode> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn query_nodes(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Node>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let raw = stmt
        .query_map(params, raw_node)
        .map_err(map_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_err)?;
    raw.into_iter().map(decode).collect()
}

fn get_node(conn: &Connection, id: &str) -> Result<Option<Node>, StoreError> {
    conn.query_row(
        "SELECT id, label, properties FROM nodes WHERE id = ?1",
        params![id],
        raw_node,
    )
    .optional()
    .map_err(map_err)?
    .map(decode)
    .transpose()
}

fn nodes_by_label(conn: &Connection, label: &str) -> Result<Vec<Node>, StoreError> {
    query_nodes(
        conn,
        "SELECT id, label, properties FROM nodes WHERE label = ?1 ORDER BY id ASC",
        &[&label],
    )
}

fn find_nodes(
    conn: &Connection,
    label: &str,
    key: &str,
    value: &Value,
) -> Result<Vec<Node>, StoreError> {
    // Enum and lineage labels are small; filter properties after decoding.
    Ok(nodes_by_label(conn, label)?
        .into_iter()
        .filter(|n| n.properties.get(key) == Some(value))
        .collect())
}

fn neighbours(
    conn: &Connection,
    id: &str,
    rel: &str,
    direction: Direction,
) -> Result<Vec<Node>, StoreError> {
    let sql = match direction {
        Direction::Outgoing => {
            "SELECT n.id, n.label, n.properties FROM edges e
             JOIN nodes n ON n.id = e.dst
             WHERE e.src = ?1 AND e.rel = ?2
             ORDER BY e.seq ASC"
        }
        Direction::Incoming => {
            "SELECT n.id, n.label, n.properties FROM edges e
             JOIN nodes n ON n.id = e.src
             WHERE e.dst = ?1 AND e.rel = ?2
             ORDER BY e.seq ASC"
        }
    };
    query_nodes(conn, sql, &[&id, &rel])
}

fn edges_by_rel(conn: &Connection, rel: &str) -> Result<Vec<Edge>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT src, rel, dst FROM edges WHERE rel = ?1 ORDER BY seq ASC")
        .map_err(map_err)?;
    let result = stmt
        .query_map(params![rel], |row| {
            Ok(Edge {
                from: row.get(0)?,
                rel: row.get(1)?,
                to: row.get(2)?,
            })
        })
        .map_err(map_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_err)?;
    Ok(result)
}

fn node_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM nodes WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .map_err(map_err)?;
    Ok(count > 0)
}

/// Forwards [`GraphRead`] to the free query functions above, for any session
/// type that can lend a `&Connection`.
macro_rules! impl_graph_read {
    ($ty:ty, |$s:ident| $conn:expr) => {
        impl GraphRead for $ty {
            fn node(&self, id: &str) -> Result<Option<Node>, StoreError> {
                let $s = self;
                get_node($conn, id)
            }

            fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>, StoreError> {
                let $s = self;
                nodes_by_label($conn, label)
            }

            fn find_nodes(
                &self,
                label: &str,
                key: &str,
                value: &Value,
            ) -> Result<Vec<Node>, StoreError> {
                let $s = self;
                find_nodes($conn, label, key, value)
            }

            fn neighbours(
                &self,
                id: &str,
                rel: &str,
                direction: Direction,
            ) -> Result<Vec<Node>, StoreError> {
                let $s = self;
                neighbours($conn, id, rel, direction)
            }

            fn edges_by_rel(&self, rel: &str) -> Result<Vec<Edge>, StoreError> {
                let $s = self;
                edges_by_rel($conn, rel)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

struct ReadSession<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl_graph_read!(ReadSession<'_>, |s| &s.conn);

struct WriteSession<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl_graph_read!(WriteSession<'_>, |s| &s.tx);

impl GraphWrite for WriteSession<'_> {
    fn create_node(&mut self, node: Node) -> Result<(), StoreError> {
        let properties = serde_json::to_string(&node.properties).map_err(map_json_err)?;
        match self.tx.execute(
            "INSERT INTO nodes (id, label, properties) VALUES (?1, ?2, ?3)",
            params![node.id, node.label, properties],
        ) {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::Conflict(format!(
                "node {} already exists",
                node.id
            ))),
            Err(e) => Err(map_err(e)),
        }
    }

    fn create_edge(&mut self, edge: Edge) -> Result<(), StoreError> {
        for endpoint in [&edge.from, &edge.to] {
            if !node_exists(&self.tx, endpoint)? {
                return Err(StoreError::NotFound(format!("node {endpoint}")));
            }
        }
        self.tx
            .execute(
                "INSERT OR IGNORE INTO edges (src, rel, dst) VALUES (?1, ?2, ?3)",
                params![edge.from, edge.rel, edge.to],
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn delete_node(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .tx
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .map_err(map_err)?;
        Ok(removed > 0)
    }
}

// ---------------------------------------------------------------------------
// GraphProvider impl
// ---------------------------------------------------------------------------

impl GraphProvider for SqliteGraph {
    fn read_session(&self) -> Result<Box<dyn GraphRead + '_>, StoreError> {
        Ok(Box::new(ReadSession { conn: self.lock()? }))
    }

    fn run_write(&self, work: &mut WriteWork<'_>) -> Result<(), StoreError> {
        with_retries(&self.retry, || {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_err)?;
            let mut session = WriteSession { tx };
            // Dropping an uncommitted transaction rolls it back.
            work(&mut session)?;
            session.tx.commit().map_err(map_err)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphProviderExt;

    fn seeded() -> SqliteGraph {
        let g = SqliteGraph::open_in_memory().unwrap();
        g.write_transaction(|tx| {
            tx.create_node(Node::new("e1", "Expression"))?;
            tx.create_node(Node::new("e2", "Expression"))?;
            tx.create_node(Node::new("e3", "Expression"))?;
            tx.create_edge(Edge::new("e2", "TRANSLATION_OF", "e1"))?;
            tx.create_edge(Edge::new("e3", "COMMENTARY_OF", "e2"))
        })
        .unwrap();
        g
    }

    #[test]
    fn properties_roundtrip_through_json() {
        let g = SqliteGraph::open_in_memory().unwrap();
        g.write_transaction(|tx| {
            tx.create_node(Node::new("n1", "Note").with("text", "a variant").with("rank", 2))
        })
        .unwrap();
        let n = g.read_session().unwrap().node("n1").unwrap().unwrap();
        assert_eq!(n.label, "Note");
        assert_eq!(n.str_prop("text").unwrap(), "a variant");
        assert_eq!(n.int_prop("rank").unwrap(), 2);
    }

    #[test]
    fn neighbours_follow_direction() {
        let g = seeded();
        let s = g.read_session().unwrap();
        let out = s.neighbours("e2", "TRANSLATION_OF", Direction::Outgoing).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "e1");
        let inc = s.neighbours("e2", "COMMENTARY_OF", Direction::Incoming).unwrap();
        assert_eq!(inc[0].id, "e3");
        assert!(s.neighbours("e1", "COMMENTARY_OF", Direction::Incoming).unwrap().is_empty());
    }

    #[test]
    fn duplicate_node_conflicts() {
        let g = seeded();
        let err = g
            .write_transaction(|tx| tx.create_node(Node::new("e1", "Expression")))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn duplicate_edge_is_ignored() {
        let g = seeded();
        g.write_transaction(|tx| tx.create_edge(Edge::new("e2", "TRANSLATION_OF", "e1")))
            .unwrap();
        let edges = g.read_session().unwrap().edges_by_rel("TRANSLATION_OF").unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn edge_to_missing_node_is_not_found() {
        let g = seeded();
        let err = g
            .write_transaction(|tx| tx.create_edge(Edge::new("e1", "TRANSLATION_OF", "ghost")))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let g = seeded();
        let result: Result<(), _> = g.write_transaction(|tx| {
            tx.create_node(Node::new("e4", "Expression"))?;
            Err(StoreError::NotFound("manifestation".into()))
        });
        assert!(result.is_err());
        assert!(g.read_session().unwrap().node("e4").unwrap().is_none());
    }

    #[test]
    fn delete_cascades_to_edges() {
        let g = seeded();
        assert!(g.write_transaction(|tx| tx.delete_node("e2")).unwrap());
        let s = g.read_session().unwrap();
        assert!(s.edges_by_rel("TRANSLATION_OF").unwrap().is_empty());
        assert!(s.edges_by_rel("COMMENTARY_OF").unwrap().is_empty());
        assert_eq!(s.nodes_by_label("Expression").unwrap().len(), 2);
    }

    #[test]
    fn deleting_absent_node_returns_false() {
        let g = seeded();
        assert!(!g.write_transaction(|tx| tx.delete_node("nobody")).unwrap());
    }
}
