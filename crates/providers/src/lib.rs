//! HTTP collaborators for the retrieval router and the answer step.
//!
//! - [`HttpRetriever`] implements [`coderag_search::VectorRetriever`] against a
//!   JSON `/retrieve` endpoint
//! - [`OllamaProvider`] implements [`LlmProvider`] with a non-streaming
//!   `/api/generate` call
//! - [`build_prompt`] wraps routed context in the grounded-answer template
//!
//! Every failure is a typed [`coderag_protocol::ProviderError`]; an empty
//! passage list is a successful answer.

mod http;
mod http_retriever;
mod llm;
mod prompt;

pub use http::{build_client, CONNECT_TIMEOUT};
pub use http_retriever::HttpRetriever;
pub use llm::{LlmProvider, OllamaProvider, DEFAULT_LLM_TIMEOUT};
pub use prompt::build_prompt;
