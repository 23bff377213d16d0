//! Tutor reply generation with the Ollama client and prompt templates

pub mod engine;
pub mod ollama;
pub mod prompt;

pub use engine::{ConversationEngine, ResponseStream};
pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, TUTOR_PREAMBLE};
