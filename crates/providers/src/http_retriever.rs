use crate::http::{base_url, build_client, map_send_error, read_json};
use async_trait::async_trait;
use coderag_protocol::{Passage, ProviderError};
use coderag_search::VectorRetriever;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "vector retriever";

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
    collection: &'a str,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    passages: Vec<Passage>,
}

/// Vector retriever reached over HTTP JSON
///
/// POSTs `{"query", "top_k", "collection"}` to `{endpoint}/retrieve` and reads
/// `{"passages": [...]}` back. Passages are re-sorted by descending score.
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    client: reqwest::Client,
    endpoint: String,
    collection: String,
    timeout: Duration,
}

impl HttpRetriever {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: base_url(SERVICE, endpoint)?,
            collection: collection.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VectorRetriever for HttpRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, ProviderError> {
        let url = format!("{}/retrieve", self.endpoint);
        log::debug!("Retrieving top {} passages from {}", top_k, url);

        let response = self
            .client
            .post(&url)
            .json(&RetrieveRequest {
                query,
                top_k,
                collection: &self.collection,
            })
            .send()
            .await
            .map_err(|e| map_send_error(SERVICE, self.timeout, e))?;

        let body: RetrieveResponse = read_json(SERVICE, self.timeout, response).await?;
        let mut passages = body.passages;
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(top_k);
        Ok(passages)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}
