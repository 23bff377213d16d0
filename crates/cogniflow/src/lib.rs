//! cogniflow: Socratic tutoring backend over uploaded study material
//!
//! Uploaded documents are split into chunks and embedded in small batches into
//! an in-memory cosine index, with per-upload job progress. Each finished index
//! is registered as a session; the latest one also becomes the default session
//! and is cached on disk. Chat requests retrieve the closest chunks and ask an
//! Ollama-served model for a guiding reply, either whole or streamed.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::{ConversationEngine, ResponseStream};
pub use processing::{IngestionPipeline, JobState, JobStatus, JobTracker};
pub use retrieval::{ContextRetriever, IndexBuilder, ProgressObserver, SearchHit, SessionStore, VectorIndex};
pub use types::{
    conversation::{Message, Role},
    document::{Chunk, FileType, PageText, VectorRecord},
    query::ChatRequest,
    response::{ChatResponse, SourceRef, UploadResponse},
};
