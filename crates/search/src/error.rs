use coderag_protocol::ProviderError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Graph store error: {0}")]
    Graph(#[from] coderag_graph::GraphError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
