use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Graph error: {0}")]
    GraphError(#[from] coderag_graph::GraphError),

    #[error("Invalid repository path: {0}")]
    InvalidPath(String),
}
