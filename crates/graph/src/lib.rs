//! # coderag graph
//!
//! Code relationship graph: static extraction of call/import edges and their
//! durable storage.
//!
//! ## Architecture
//!
//! ```text
//! (file path, source text)
//!     │
//!     ├──> SourceAnalyzer (tree-sitter)
//!     │      ├─ Definitions: functions (sync/async), classes
//!     │      ├─ Calls: attributed to the innermost enclosing definition
//!     │      └─ Imports: dotted targets, one edge per imported name
//!     │
//!     └──> GraphStore (SQLite)
//!            ├─ nodes / edges / graph_metadata tables
//!            ├─ successors, predecessors, call_chain (BFS)
//!            └─ clear_scope(collection), stats_for(collection)
//! ```
//!
//! Nodes are scoped per collection by id prefix (`{collection}:{file}:{name}`)
//! and by the `collection` metadata tag.

mod analyzer;
mod error;
mod schema;
mod store;
mod types;

pub use analyzer::{ExtractedEdge, FileGraph, SourceAnalyzer, SUPPORTED_EXTENSIONS};
pub use error::{GraphError, Result};
pub use store::{ClearedScope, GraphStore};
pub use types::{
    file_scoped_id, scoped_id, Edge, GraphStats, Metadata, Node, NodeKind, Relation,
    COLLECTION_KEY,
};
