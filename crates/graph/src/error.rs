use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Parser setup error: {0}")]
    Parser(String),

    #[error("{0}: syntax error")]
    Syntax(String),

    #[error("Unknown {field} value in store: {value}")]
    Corrupt { field: &'static str, value: String },
}
