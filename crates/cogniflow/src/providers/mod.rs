//! Provider abstractions for embeddings and chat generation
//!
//! The indexing and conversation code only sees these traits, so the Ollama
//! backend can be swapped for any other service or an in-process test double.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::{FragmentStream, LlmProvider};
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
