use crate::error::{Result, SearchError};
use crate::graph_search::{GraphAnswer, GraphSearchEngine};
use crate::identifier::IdentifierExtractor;
use crate::query_classifier::{QueryClassifier, QueryType};
use crate::retriever::VectorRetriever;
use coderag_protocol::{Passage, ProviderError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 20;
pub const DEFAULT_RETRIEVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request routing knobs
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOptions {
    /// Passages requested from the retriever, clamped to `1..=20`
    pub top_k: usize,
    /// Passages scoring below this are dropped
    pub min_score: f32,
    /// Character budget for semantic passages; a passage is never split
    pub max_chars: Option<usize>,
    /// Overrides the engine's call-chain depth
    pub chain_depth: Option<usize>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: 0.0,
            max_chars: None,
            chain_depth: None,
        }
    }
}

impl RouteOptions {
    pub fn effective_top_k(&self) -> usize {
        self.top_k.clamp(1, MAX_TOP_K)
    }
}

/// Branch that ran with reduced output, recorded instead of hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// No function name could be read from the question; graph branch skipped
    NoIdentifier,
    /// Passages were cut to fit the character budget
    BudgetTruncated,
}

/// Routed retrieval result: per-branch output plus the flattened context
#[derive(Debug, Clone, Serialize)]
pub struct RoutedContext {
    pub query: String,
    pub query_type: QueryType,
    pub identifier: Option<String>,
    pub graph: Option<GraphAnswer>,
    pub semantic: Vec<Passage>,
    pub degradation: Vec<Degradation>,
    pub context: String,
}

/// Classifies a question and merges graph facts with semantic passages
pub struct RetrievalRouter<'s> {
    engine: GraphSearchEngine<'s>,
    retriever: Option<Arc<dyn VectorRetriever>>,
    timeout: Duration,
}

impl<'s> RetrievalRouter<'s> {
    pub fn new(engine: GraphSearchEngine<'s>) -> Self {
        Self {
            engine,
            retriever: None,
            timeout: DEFAULT_RETRIEVER_TIMEOUT,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn VectorRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Upper bound for one retriever call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn route(&self, text: &str, options: &RouteOptions) -> Result<RoutedContext> {
        let query = text.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let query_type = QueryClassifier::classify(query);
        log::debug!("Query classified as {}: {}", query_type, query);

        let mut degradation = Vec::new();
        let mut identifier = None;
        let mut graph = None;

        if query_type.wants_graph() {
            identifier = IdentifierExtractor::extract(query);
            match &identifier {
                Some(name) => {
                    let engine = match options.chain_depth {
                        Some(depth) => self.engine.clone().with_chain_depth(depth),
                        None => self.engine.clone(),
                    };
                    graph = Some(engine.search(name, query)?);
                }
                None => {
                    log::warn!("No identifier in '{}', skipping graph search", query);
                    degradation.push(Degradation::NoIdentifier);
                }
            }
        }

        let mut semantic = Vec::new();
        if query_type.wants_semantic() {
            let passages = self.retrieve(query, options.effective_top_k()).await?;
            let (kept, truncated) = apply_budget(passages, options.min_score, options.max_chars);
            if truncated {
                degradation.push(Degradation::BudgetTruncated);
            }
            semantic = kept;
        }

        let context = render_context(graph.as_ref(), &semantic);
        Ok(RoutedContext {
            query: query.to_string(),
            query_type,
            identifier,
            graph,
            semantic,
            degradation,
            context,
        })
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let retriever = self.retriever.as_ref().ok_or_else(|| {
            ProviderError::Misconfigured("no vector retriever configured".to_string())
        })?;

        match tokio::time::timeout(self.timeout, retriever.retrieve(query, top_k)).await {
            Ok(passages) => Ok(passages?),
            Err(_) => {
                log::warn!(
                    "{} did not answer within {:?}",
                    retriever.name(),
                    self.timeout
                );
                Err(ProviderError::timeout(retriever.name(), self.timeout).into())
            }
        }
    }
}

/// Drop passages below `min_score`, then keep passages in order until the
/// next one would exceed `max_chars`. Returns whether the budget cut any.
fn apply_budget(
    passages: Vec<Passage>,
    min_score: f32,
    max_chars: Option<usize>,
) -> (Vec<Passage>, bool) {
    let mut kept = Vec::new();
    let mut used = 0usize;

    for passage in passages.into_iter().filter(|p| p.score >= min_score) {
        if let Some(budget) = max_chars {
            let size = passage.text.chars().count();
            if used + size > budget {
                return (kept, true);
            }
            used += size;
        }
        kept.push(passage);
    }

    (kept, false)
}

fn render_context(graph: Option<&GraphAnswer>, semantic: &[Passage]) -> String {
    let mut out = String::new();

    if let Some(answer) = graph {
        out.push_str(&format!(
            "## Graph facts ({} of {})\n",
            answer.intent, answer.function
        ));
        for fact in answer.facts() {
            out.push_str("- ");
            out.push_str(&fact);
            out.push('\n');
        }
        out.push('\n');
    }

    if !semantic.is_empty() {
        out.push_str("## Code passages\n");
        for (rank, passage) in semantic.iter().enumerate() {
            out.push_str(&format!(
                "--- [{}] {} (score {:.3}) ---\n",
                rank + 1,
                passage.source_label(),
                passage.score
            ));
            out.push_str(&passage.text);
            out.push_str("\n\n");
        }
    }

    out.truncate(out.trim_end().len());
    out
}
