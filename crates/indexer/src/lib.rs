//! # coderag indexer
//!
//! Builds the code relationship graph of a repository.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware, exclusion globs)
//!     │      └─> Python sources
//!     │
//!     ├──> SourceAnalyzer (tree-sitter)
//!     │      └─> Definitions + raw call/import relations
//!     │
//!     └──> GraphStore (one transaction)
//!            ├─ nodes `{collection}:{file}:{name}`
//!            └─ edges with resolved call targets
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use coderag_graph::GraphStore;
//! use coderag_indexer::CodeGraphIndexer;
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = GraphStore::open("data/code_graph.db")?;
//!     let stats = CodeGraphIndexer::new(&store)
//!         .with_excludes(["tests"])
//!         .index("/path/to/repo", "code_repository")?;
//!
//!     println!("Indexed {} files, {} nodes, {} edges", stats.files, stats.nodes, stats.edges);
//!     Ok(())
//! }
//! ```

mod error;
mod indexer;
mod scanner;
mod stats;

pub use error::{IndexerError, Result};
pub use indexer::{last_indexed_key, num_files_key, repo_path_key, CodeGraphIndexer};
pub use scanner::FileScanner;
pub use stats::IndexStats;
