use async_trait::async_trait;
use coderag_protocol::{Passage, ProviderError};

/// External semantic index answering top-k passage queries
///
/// Implementations return passages in descending score order and report
/// transport failures as [`ProviderError`]; an empty list means nothing
/// matched.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, ProviderError>;

    /// Short name used in logs and errors.
    fn name(&self) -> &str {
        "retriever"
    }
}
