use serde::{Deserialize, Serialize};

/// Statistics about one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of files analyzed
    pub files: usize,

    /// Number of definition nodes written
    pub nodes: usize,

    /// Number of edges actually inserted (duplicates excluded)
    pub edges: usize,

    /// Per-file failures, `{path}: {reason}`
    pub errors: Vec<String>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, nodes: usize) {
        self.files += 1;
        self.nodes += nodes;
    }

    pub fn add_edge(&mut self, inserted: bool) {
        if inserted {
            self.edges += 1;
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
