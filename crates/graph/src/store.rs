//! SQLite-backed persistence for the code graph.
//!
//! Every statement goes through [`Connection::prepare_cached`], so repeated
//! queries during indexing and traversal reuse compiled statements.

use crate::error::{GraphError, Result};
use crate::schema;
use crate::types::{Edge, GraphStats, Metadata, Node, NodeKind, Relation, COLLECTION_KEY};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

const NODE_COLUMNS: &str = "id, name, kind, file_path, line_number, signature, metadata";
const JOINED_NODE_COLUMNS: &str =
    "n.id, n.name, n.kind, n.file_path, n.line_number, n.signature, n.metadata";

const UPSERT_NODE_SQL: &str = "\
INSERT INTO nodes (id, name, kind, file_path, line_number, signature, metadata, collection)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(id) DO UPDATE SET
  name = excluded.name,
  kind = excluded.kind,
  file_path = excluded.file_path,
  line_number = excluded.line_number,
  signature = excluded.signature,
  metadata = excluded.metadata,
  collection = excluded.collection";

const INSERT_EDGE_SQL: &str = "\
INSERT INTO edges (source_id, target_id, relation, metadata, collection)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(source_id, target_id, relation) DO NOTHING";

const CALL_TARGETS_SQL: &str = "\
SELECT target_id FROM edges WHERE source_id = ?1 AND relation = 'calls' ORDER BY id";

// Rows tagged with the collection, plus untagged rows whose id carries the
// `{collection}:` prefix.
const DELETE_SCOPED_EDGES_SQL: &str = "\
DELETE FROM edges WHERE collection = ?1
   OR (collection IS NULL AND substr(source_id, 1, length(?1) + 1) = ?1 || ':')";

const DELETE_SCOPED_NODES_SQL: &str = "\
DELETE FROM nodes WHERE collection = ?1
   OR (collection IS NULL AND substr(id, 1, length(?1) + 1) = ?1 || ':')";

// Bookkeeping keys are suffixed `:{collection}`.
const DELETE_SCOPED_META_SQL: &str = "\
DELETE FROM graph_metadata WHERE substr(key, -(length(?1) + 1)) = ':' || ?1";

/// Rows removed by [`GraphStore::clear_scope`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearedScope {
    pub nodes: usize,
    pub edges: usize,
}

/// Durable node/edge/metadata store
///
/// Holds a single connection; writes assume one indexing run at a time.
pub struct GraphStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Raw column values, decoded into a [`Node`] outside the rusqlite closure
struct NodeRow {
    id: String,
    name: String,
    kind: String,
    file_path: String,
    line_number: i64,
    signature: Option<String>,
    metadata: Option<String>,
}

impl NodeRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            file_path: row.get(3)?,
            line_number: row.get(4)?,
            signature: row.get(5)?,
            metadata: row.get(6)?,
        })
    }

    fn into_node(self) -> Result<Node> {
        let kind = self
            .kind
            .parse::<NodeKind>()
            .map_err(|value| GraphError::Corrupt { field: "kind", value })?;
        Ok(Node {
            id: self.id,
            name: self.name,
            kind,
            file_path: self.file_path,
            line_number: usize::try_from(self.line_number).unwrap_or_default(),
            signature: self.signature,
            metadata: decode_metadata(self.metadata.as_deref())?,
        })
    }
}

fn encode_metadata(metadata: &Metadata) -> Result<Option<String>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(metadata)?))
}

fn decode_metadata(raw: Option<&str>) -> Result<Metadata> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(serde_json::from_str(raw)?),
        _ => Ok(Metadata::new()),
    }
}

impl GraphStore {
    /// Open (or create) the database at `path`, creating parent directories
    /// and the schema as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        log::debug!("Opened graph store at {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory store (tests, dry runs).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside one transaction; rolled back if `f` fails.
    pub fn batch<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Insert or replace a node by id.
    pub fn upsert_node(&self, node: &Node) -> Result<()> {
        let metadata = encode_metadata(&node.metadata)?;
        let mut stmt = self.conn.prepare_cached(UPSERT_NODE_SQL)?;
        stmt.execute(params![
            node.id,
            node.name,
            node.kind.as_str(),
            node.file_path,
            node.line_number as i64,
            node.signature,
            metadata,
            node.metadata.get(COLLECTION_KEY),
        ])?;
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let row = stmt.query_row([id], NodeRow::read).optional()?;
        row.map(NodeRow::into_node).transpose()
    }

    /// All nodes in insertion order, optionally filtered by kind.
    pub fn list_nodes(&self, kind: Option<NodeKind>) -> Result<Vec<Node>> {
        match kind {
            Some(kind) => self.query_nodes(
                &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE kind = ?1 ORDER BY rowid"),
                &[kind.as_str()],
            ),
            None => self.query_nodes(
                &format!("SELECT {NODE_COLUMNS} FROM nodes ORDER BY rowid"),
                &[],
            ),
        }
    }

    /// Nodes defined in `file_path`, ordered by line number.
    pub fn list_nodes_in_file(&self, file_path: &str) -> Result<Vec<Node>> {
        self.query_nodes(
            &format!(
                "SELECT {NODE_COLUMNS} FROM nodes WHERE file_path = ?1 ORDER BY line_number, rowid"
            ),
            &[file_path],
        )
    }

    /// Nodes named exactly `name`, in insertion order.
    pub fn find_nodes_by_name(
        &self,
        name: &str,
        kind: Option<NodeKind>,
        collection: Option<&str>,
    ) -> Result<Vec<Node>> {
        let mut sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE name = ?1");
        let mut args = vec![name];
        if let Some(kind) = kind {
            args.push(kind.as_str());
            sql.push_str(&format!(" AND kind = ?{}", args.len()));
        }
        if let Some(collection) = collection {
            args.push(collection);
            sql.push_str(&format!(" AND collection = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY rowid");
        self.query_nodes(&sql, &args)
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Insert an edge; returns `false` when the (source, target, relation)
    /// tuple already exists.
    pub fn insert_edge(&self, edge: &Edge) -> Result<bool> {
        let metadata = encode_metadata(&edge.metadata)?;
        let mut stmt = self.conn.prepare_cached(INSERT_EDGE_SQL)?;
        let changed = stmt.execute(params![
            edge.source_id,
            edge.target_id,
            edge.relation.as_str(),
            metadata,
            edge.metadata.get(COLLECTION_KEY),
        ])?;
        Ok(changed > 0)
    }

    /// Stored nodes reachable by one outgoing edge from `id`, ordered by name.
    pub fn successors(&self, id: &str, relation: Option<Relation>) -> Result<Vec<Node>> {
        self.neighbors(id, relation, "e.target_id", "e.source_id")
    }

    /// Stored nodes with an edge pointing at `id`, ordered by name.
    pub fn predecessors(&self, id: &str, relation: Option<Relation>) -> Result<Vec<Node>> {
        self.neighbors(id, relation, "e.source_id", "e.target_id")
    }

    fn neighbors(
        &self,
        id: &str,
        relation: Option<Relation>,
        join_column: &str,
        anchor_column: &str,
    ) -> Result<Vec<Node>> {
        let mut sql = format!(
            "SELECT DISTINCT {JOINED_NODE_COLUMNS} FROM nodes n \
             INNER JOIN edges e ON n.id = {join_column} \
             WHERE {anchor_column} = ?1"
        );
        let mut args = vec![id];
        if let Some(relation) = relation {
            args.push(relation.as_str());
            sql.push_str(" AND e.relation = ?2");
        }
        sql.push_str(" ORDER BY n.name, n.id");
        self.query_nodes(&sql, &args)
    }

    /// Breadth-first walk over `calls` edges starting at `start_id`.
    ///
    /// The start node sits at depth 0; nodes at depth `>= max_depth` are not
    /// expanded, and each node is expanded at most once. Returns the edges
    /// discovered along the way, in discovery order.
    pub fn call_chain(&self, start_id: &str, max_depth: usize) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare_cached(CALL_TARGETS_SQL)?;
        let mut chain = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::from([(start_id.to_string(), 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth || !visited.insert(current.clone()) {
                continue;
            }

            let targets = stmt
                .query_map([&current], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for target in targets {
                chain.push((current.clone(), target.clone()));
                if !visited.contains(&target) {
                    queue.push_back((target, depth + 1));
                }
            }
        }

        Ok(chain)
    }

    // ------------------------------------------------------------------
    // Clearing
    // ------------------------------------------------------------------

    /// Remove every node, edge and metadata entry.
    pub fn clear(&self) -> Result<()> {
        self.batch(|store| {
            store.conn.execute("DELETE FROM edges", [])?;
            store.conn.execute("DELETE FROM nodes", [])?;
            store.conn.execute("DELETE FROM graph_metadata", [])?;
            Ok(())
        })?;
        log::info!("Cleared graph store");
        Ok(())
    }

    /// Remove the nodes, edges and `*:{collection}` metadata keys belonging
    /// to `collection`.
    pub fn clear_scope(&self, collection: &str) -> Result<ClearedScope> {
        let cleared = self.batch(|store| {
            let edges = store.conn.execute(DELETE_SCOPED_EDGES_SQL, [collection])?;
            let nodes = store.conn.execute(DELETE_SCOPED_NODES_SQL, [collection])?;
            store.conn.execute(DELETE_SCOPED_META_SQL, [collection])?;
            Ok(ClearedScope { nodes, edges })
        })?;
        log::debug!(
            "Cleared collection '{}': {} nodes, {} edges",
            collection,
            cleared.nodes,
            cleared.edges
        );
        Ok(cleared)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO graph_metadata (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             updated_at = strftime('%s','now')",
        )?;
        stmt.execute([key, value])?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM graph_metadata WHERE key = ?1")?;
        Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn stats(&self) -> Result<GraphStats> {
        self.collect_stats(None)
    }

    /// Counts restricted to one collection.
    pub fn stats_for(&self, collection: &str) -> Result<GraphStats> {
        self.collect_stats(Some(collection))
    }

    fn collect_stats(&self, collection: Option<&str>) -> Result<GraphStats> {
        let filter = if collection.is_some() {
            " WHERE collection = ?1"
        } else {
            ""
        };
        let args: Vec<&str> = collection.into_iter().collect();

        let node_count = self.count(&format!("SELECT COUNT(*) FROM nodes{filter}"), &args)?;
        let edge_count = self.count(&format!("SELECT COUNT(*) FROM edges{filter}"), &args)?;
        let nodes_by_kind = self.grouped(
            &format!("SELECT kind, COUNT(*) FROM nodes{filter} GROUP BY kind"),
            &args,
        )?;
        let edges_by_relation = self.grouped(
            &format!("SELECT relation, COUNT(*) FROM edges{filter} GROUP BY relation"),
            &args,
        )?;

        Ok(GraphStats {
            node_count,
            edge_count,
            nodes_by_kind,
            edges_by_relation,
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn query_nodes(&self, sql: &str, args: &[&str]) -> Result<Vec<Node>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), NodeRow::read)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?.into_node()?);
        }
        Ok(nodes)
    }

    fn count(&self, sql: &str, args: &[&str]) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let count: i64 = stmt.query_row(params_from_iter(args.iter()), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn grouped(&self, sql: &str, args: &[&str]) -> Result<BTreeMap<String, usize>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut grouped = BTreeMap::new();
        for row in rows {
            let (key, count) = row?;
            grouped.insert(key, usize::try_from(count).unwrap_or_default());
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn function(id: &str, name: &str, line: usize) -> Node {
        Node::new(id, name, NodeKind::Function, "app.py", line)
            .with_signature(format!("def {name}()"))
    }

    #[test]
    fn upsert_replaces_without_moving_insertion_order() {
        let store = GraphStore::in_memory().unwrap();
        store.upsert_node(&function("a", "alpha", 1)).unwrap();
        store.upsert_node(&function("b", "beta", 5)).unwrap();
        store.upsert_node(&function("a", "alpha", 9)).unwrap();

        let nodes = store.list_nodes(None).unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(nodes[0].line_number, 9);
    }

    #[test]
    fn list_nodes_filters_by_kind() {
        let store = GraphStore::in_memory().unwrap();
        store.upsert_node(&function("f", "f", 1)).unwrap();
        store
            .upsert_node(&Node::new("C", "C", NodeKind::Class, "app.py", 2))
            .unwrap();

        let classes = store.list_nodes(Some(NodeKind::Class)).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "C");
        assert_eq!(store.list_nodes(None).unwrap().len(), 2);
    }

    #[test]
    fn file_listing_is_ordered_by_line() {
        let store = GraphStore::in_memory().unwrap();
        store.upsert_node(&function("late", "late", 40)).unwrap();
        store.upsert_node(&function("early", "early", 3)).unwrap();
        store
            .upsert_node(&Node::new("other", "other", NodeKind::Function, "other.py", 1))
            .unwrap();

        let names: Vec<_> = store
            .list_nodes_in_file("app.py")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn neighbors_are_distinct_and_sorted_by_name() {
        let store = GraphStore::in_memory().unwrap();
        for (id, name) in [("m", "main"), ("z", "zeta"), ("b", "beta")] {
            store.upsert_node(&function(id, name, 1)).unwrap();
        }
        store.insert_edge(&Edge::new("m", "z", Relation::Calls)).unwrap();
        store.insert_edge(&Edge::new("m", "b", Relation::Calls)).unwrap();
        store.insert_edge(&Edge::new("m", "b", Relation::Imports)).unwrap();
        store
            .insert_edge(&Edge::new("m", "missing", Relation::Calls))
            .unwrap();

        let all: Vec<_> = store
            .successors("m", None)
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(all, vec!["beta", "zeta"]);

        let imports = store.successors("m", Some(Relation::Imports)).unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].id, "b");
    }

    #[test]
    fn metadata_round_trips_and_overwrites() {
        let store = GraphStore::in_memory().unwrap();
        assert_eq!(store.get_meta("last_indexed").unwrap(), None);
        store.set_meta("last_indexed", "1").unwrap();
        store.set_meta("last_indexed", "2").unwrap();
        assert_eq!(store.get_meta("last_indexed").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn clear_removes_everything() {
        let store = GraphStore::in_memory().unwrap();
        store.upsert_node(&function("a", "a", 1)).unwrap();
        store.insert_edge(&Edge::new("a", "b", Relation::Calls)).unwrap();
        store.set_meta("k", "v").unwrap();

        store.clear().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
        assert_eq!(store.get_meta("k").unwrap(), None);
    }

    #[test]
    fn clear_scope_also_removes_untagged_rows_with_collection_prefix() {
        let store = GraphStore::in_memory().unwrap();
        store.upsert_node(&function("x:app.py:a", "a", 1)).unwrap();
        store.upsert_node(&function("xy:app.py:a", "a", 1)).unwrap();
        store
            .insert_edge(&Edge::new("x:app.py:a", "x:app.py:b", Relation::Calls))
            .unwrap();

        store.set_meta("num_files:x", "1").unwrap();
        store.set_meta("num_files:xy", "1").unwrap();

        let cleared = store.clear_scope("x").unwrap();
        assert_eq!(cleared, ClearedScope { nodes: 1, edges: 1 });
        assert!(store.get_node("xy:app.py:a").unwrap().is_some());
        assert_eq!(store.get_meta("num_files:x").unwrap(), None);
        assert_eq!(store.get_meta("num_files:xy").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn batch_rolls_back_on_error() {
        let store = GraphStore::in_memory().unwrap();
        let result: Result<()> = store.batch(|s| {
            s.upsert_node(&function("a", "a", 1))?;
            Err(GraphError::Parser("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(store.get_node("a").unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_directories() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("data").join("code_graph.db");
        {
            let store = GraphStore::open(&path).unwrap();
            store.upsert_node(&function("a", "a", 1)).unwrap();
        }
        let reopened = GraphStore::open(&path).unwrap();
        assert!(reopened.get_node("a").unwrap().is_some());
        assert_eq!(reopened.path(), Some(path.as_path()));
    }
}
