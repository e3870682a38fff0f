//! Semantic search and retrieval-augmented generation over the document
//! store: vector search with SQL pre-filtering, context window expansion
//! around matches, and prompt assembly for grounded answers.

pub mod engine;
pub mod error;
pub mod rag;

pub use engine::{ContextualMatch, RetrievalEngine};
pub use error::{RetrievalError, RetrievalResult};
pub use rag::{
    ConversationTurn, RagOrchestrator, RagResponse, RetrievalInfo, RetrievalMatchInfo, TurnRole,
};
