use crate::config::Settings;
use anyhow::{Context as AnyhowContext, Result};
use coderag_graph::GraphStore;
use coderag_providers::{HttpRetriever, LlmProvider, OllamaProvider};
use coderag_search::{GraphSearchEngine, RetrievalRouter, VectorRetriever};
use std::sync::Arc;
use std::time::Duration;

/// Everything a command needs, built once from the resolved settings
pub struct AppContext {
    pub settings: Settings,
    pub store: GraphStore,
    retriever: Option<Arc<dyn VectorRetriever>>,
}

impl AppContext {
    pub fn open(settings: Settings) -> Result<Self> {
        let store = GraphStore::open(&settings.db_path)
            .with_context(|| format!("failed to open graph database {}", settings.db_path.display()))?;

        let retriever = match settings.retriever.url.as_deref() {
            Some(url) => {
                let retriever = HttpRetriever::new(
                    url,
                    settings.collection.clone(),
                    Duration::from_secs(settings.retriever.timeout_secs),
                )?;
                Some(Arc::new(retriever) as Arc<dyn VectorRetriever>)
            }
            None => None,
        };

        Ok(Self {
            settings,
            store,
            retriever,
        })
    }

    pub fn collection(&self) -> &str {
        &self.settings.collection
    }

    pub fn graph_engine(&self) -> GraphSearchEngine<'_> {
        GraphSearchEngine::new(&self.store)
            .with_collection(self.settings.collection.clone())
            .with_chain_depth(self.settings.search.chain_depth)
    }

    pub fn router(&self) -> RetrievalRouter<'_> {
        let router = RetrievalRouter::new(self.graph_engine())
            .with_timeout(Duration::from_secs(self.settings.retriever.timeout_secs));
        match &self.retriever {
            Some(retriever) => router.with_retriever(Arc::clone(retriever)),
            None => router,
        }
    }

    /// LLM client, built on demand since only `query --ask` needs one.
    pub fn llm(&self) -> Result<Box<dyn LlmProvider>> {
        let ollama = &self.settings.ollama;
        let provider = OllamaProvider::with_timeout(
            &ollama.base_url,
            ollama.model.clone(),
            Duration::from_secs(ollama.timeout_secs),
        )?;
        Ok(Box::new(provider))
    }
}
