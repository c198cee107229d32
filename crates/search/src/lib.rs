//! # coderag search
//!
//! Query-time routing between the code graph and an external vector index.
//!
//! ```text
//! question
//!     │
//!     ├──> QueryClassifier ──> Semantic | Graph | Hybrid
//!     │
//!     ├──> (Graph/Hybrid) IdentifierExtractor ──> GraphSearchEngine
//!     │                         └─ callers / calls / chain / impact
//!     │
//!     ├──> (Semantic/Hybrid) VectorRetriever (timeout, min score, budget)
//!     │
//!     └──> RetrievalRouter: graph facts first, then passages
//! ```

mod error;
mod graph_search;
mod identifier;
mod query_classifier;
mod retriever;
mod router;

pub use error::{Result, SearchError};
pub use graph_search::{
    ChainLink, GraphAnswer, GraphFindings, GraphIntent, GraphSearchEngine, ImpactEntry,
    ImpactRole, DEFAULT_CHAIN_DEPTH,
};
pub use identifier::{IdentifierExtractor, STOP_WORDS};
pub use query_classifier::{
    MatchedPhrases, QueryClassifier, QueryType, GRAPH_PHRASES, SEMANTIC_PHRASES,
};
pub use retriever::VectorRetriever;
pub use router::{
    Degradation, RetrievalRouter, RouteOptions, RoutedContext, DEFAULT_RETRIEVER_TIMEOUT,
    DEFAULT_TOP_K, MAX_TOP_K,
};
