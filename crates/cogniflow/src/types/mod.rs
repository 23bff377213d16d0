//! Core types for the tutoring backend

pub mod conversation;
pub mod document;
pub mod query;
pub mod response;

pub use conversation::{Message, Role};
pub use document::{Chunk, FileType, PageText, VectorRecord};
pub use query::ChatRequest;
pub use response::{ChatResponse, SourceRef, UploadResponse};
