use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Retrieval strategy a question should be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Vector search over passages
    Semantic,
    /// Code relationship graph
    Graph,
    /// Both, graph facts first
    Hybrid,
}

impl QueryType {
    pub const fn as_str(self) -> &'static str {
        match self {
            QueryType::Semantic => "semantic",
            QueryType::Graph => "graph",
            QueryType::Hybrid => "hybrid",
        }
    }

    pub const fn wants_graph(self) -> bool {
        matches!(self, QueryType::Graph | QueryType::Hybrid)
    }

    pub const fn wants_semantic(self) -> bool {
        matches!(self, QueryType::Semantic | QueryType::Hybrid)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(QueryType::Semantic),
            "graph" => Ok(QueryType::Graph),
            "hybrid" => Ok(QueryType::Hybrid),
            other => Err(format!("unknown query type '{other}'")),
        }
    }
}

/// Phrases signalling a question about code relationships.
pub const GRAPH_PHRASES: &[&str] = &[
    "who calls",
    "what calls",
    "calls what",
    "called by",
    "callers",
    "callees",
    "call chain",
    "call graph",
    "calls which",
    "invokes",
    "invoked by",
    "used by",
    "depends on",
    "dependencies",
    "dependency",
    "impact",
    "affects",
    "affected by",
    "imports",
    "imported by",
    "execution order",
    "runs before",
    "runs after",
    "call sequence",
    "flow",
];

/// Entries that only count as whole words ("flow" but not "workflow").
const WHOLE_WORD_PHRASES: &[&str] = &["flow"];

/// Phrases signalling a question about meaning or behaviour.
pub const SEMANTIC_PHRASES: &[&str] = &[
    "how does",
    "how do",
    "how is",
    "how are",
    "explain",
    "describe",
    "why",
    "behavior",
    "behaviour",
    "purpose",
    "meaning",
    "what is",
    "what happens",
    "validation",
    "algorithm",
    "logic",
    "implementation",
    "used for",
];

/// Label reported when [`WHAT_DOES_DO`] fires.
pub const WHAT_DOES_DO_LABEL: &str = "what does … do";

/// Label reported when [`WHAT_DOES_CALL`] fires.
pub const WHAT_DOES_CALL_LABEL: &str = "what does … call";

static WHAT_DOES_DO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwhat\s+does\s+.+?\s+do\b").expect("valid regex"));

static WHAT_DOES_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:what|which\s+\w+)\s+does\s+.+?\s+(?:call|invoke)s?\b")
        .expect("valid regex")
});

/// "what does X call" and "which functions does X invoke" phrasing.
pub(crate) fn asks_for_callees(lowered: &str) -> bool {
    WHAT_DOES_CALL.is_match(lowered)
}

/// Case-folded `text` contains `phrase`, as a whole word where the phrase
/// table requires it.
pub(crate) fn contains_phrase(lowered: &str, phrase: &str) -> bool {
    if !WHOLE_WORD_PHRASES.contains(&phrase) {
        return lowered.contains(phrase);
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    lowered.match_indices(phrase).any(|(at, _)| {
        let before = lowered[..at].chars().next_back();
        let after = lowered[at + phrase.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Phrases from each table found in a question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchedPhrases {
    pub graph: Vec<&'static str>,
    pub semantic: Vec<&'static str>,
}

pub struct QueryClassifier;

impl QueryClassifier {
    /// Classify a question. Total: unrecognized phrasing is Semantic.
    #[must_use]
    pub fn classify(query: &str) -> QueryType {
        let matched = Self::matched_phrases(query);
        match (matched.graph.is_empty(), matched.semantic.is_empty()) {
            (false, false) => QueryType::Hybrid,
            (false, true) => QueryType::Graph,
            (true, false) => QueryType::Semantic,
            (true, true) => QueryType::Semantic,
        }
    }

    /// Every phrase of both tables occurring in `query` (case-insensitive).
    #[must_use]
    pub fn matched_phrases(query: &str) -> MatchedPhrases {
        let lowered = query.to_lowercase();

        let mut graph: Vec<&'static str> = GRAPH_PHRASES
            .iter()
            .copied()
            .filter(|phrase| contains_phrase(&lowered, phrase))
            .collect();
        if asks_for_callees(&lowered) {
            graph.push(WHAT_DOES_CALL_LABEL);
        }

        let mut semantic: Vec<&'static str> = SEMANTIC_PHRASES
            .iter()
            .copied()
            .filter(|phrase| lowered.contains(phrase))
            .collect();
        if WHAT_DOES_DO.is_match(&lowered) {
            semantic.push(WHAT_DOES_DO_LABEL);
        }

        MatchedPhrases { graph, semantic }
    }

    #[must_use]
    pub const fn strategy_hint(query_type: QueryType) -> &'static str {
        match query_type {
            QueryType::Semantic => "Vector search (semantic context)",
            QueryType::Graph => "Graph search (code relationships)",
            QueryType::Hybrid => "Hybrid search (graph relationships + semantic context)",
        }
    }
}
