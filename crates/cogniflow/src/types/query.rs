//! Chat request types

use serde::{Deserialize, Serialize};

use super::conversation::Message;

/// Chat request sent by the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The student's question
    pub message: String,

    /// Prior conversation, oldest first
    #[serde(default)]
    pub history: Vec<Message>,

    /// Session (uploaded document) to ground the answer in
    #[serde(default)]
    pub file_id: Option<String>,

    /// Stream the answer as server-sent events (default: false)
    #[serde(default)]
    pub stream: bool,

    /// Number of chunks to retrieve (default: from config)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl ChatRequest {
    /// Create a new request
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            file_id: None,
            stream: false,
            top_k: None,
        }
    }

    /// Target a specific session
    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// Attach prior history
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}
