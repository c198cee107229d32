//! SQLite schema for the graph store.
//!
//! Three tables: `nodes` (definition sites), `edges` (calls/imports) and
//! `graph_metadata` (free-form bookkeeping). Edges carry no foreign keys:
//! call targets are resolved by bare name and frequently point at ids that
//! were never indexed.

pub(crate) const SCHEMA_VERSION: &str = "1";

pub(crate) const CREATE_NODES: &str = "\
CREATE TABLE IF NOT EXISTS nodes (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  kind TEXT NOT NULL,
  file_path TEXT NOT NULL,
  line_number INTEGER NOT NULL,
  signature TEXT,
  metadata TEXT,
  collection TEXT,
  created_at INTEGER DEFAULT (strftime('%s','now'))
)";

pub(crate) const CREATE_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS edges (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  source_id TEXT NOT NULL,
  target_id TEXT NOT NULL,
  relation TEXT NOT NULL,
  metadata TEXT,
  collection TEXT,
  created_at INTEGER DEFAULT (strftime('%s','now')),
  UNIQUE(source_id, target_id, relation)
)";

pub(crate) const CREATE_METADATA: &str = "\
CREATE TABLE IF NOT EXISTS graph_metadata (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER DEFAULT (strftime('%s','now'))
)";

pub(crate) const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_collection ON nodes(collection)",
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation)",
    "CREATE INDEX IF NOT EXISTS idx_edges_collection ON edges(collection)",
];

pub(crate) const PRAGMAS: &str = "\
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = OFF;";

/// Apply pragmas and create all tables/indexes if missing.
pub(crate) fn initialize(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(PRAGMAS)?;
    // WAL is silently ignored for in-memory databases
    let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

    conn.execute_batch(CREATE_NODES)?;
    conn.execute_batch(CREATE_EDGES)?;
    conn.execute_batch(CREATE_METADATA)?;
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO graph_metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}
