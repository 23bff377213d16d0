//! Vector indexing, session registry and query-time retrieval

pub mod builder;
pub mod context;
pub mod session_store;
pub mod vector_index;

pub use builder::{IndexBuilder, NoProgress, ProgressObserver};
pub use context::ContextRetriever;
pub use session_store::{CacheManifest, SessionStore, DEFAULT_SESSION};
pub use vector_index::{SearchHit, VectorIndex};
