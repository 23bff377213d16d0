//! Response types for the HTTP surface

use serde::{Deserialize, Serialize};

use crate::retrieval::SearchHit;

/// Maximum characters of chunk text echoed back as a source snippet
const SNIPPET_CHARS: usize = 200;

/// Reply to a blocking chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Tutor reply
    pub reply: String,
    /// Model that produced the reply
    #[serde(default)]
    pub model: String,
    /// Passages the reply was grounded in, most relevant first
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

/// A retrieved passage reported alongside a reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: Option<String>,
    pub page: Option<u32>,
    pub similarity: f32,
    pub snippet: String,
}

impl SourceRef {
    pub fn from_hit(hit: &SearchHit) -> Self {
        Self {
            source: hit.chunk.source().map(str::to_string),
            page: hit.chunk.page(),
            similarity: hit.similarity,
            snippet: truncate_snippet(&hit.chunk.text, SNIPPET_CHARS),
        }
    }
}

/// Acknowledgement returned as soon as an upload is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Session id the finished index will be registered under
    pub file_id: String,
    /// Job id to poll; equal to `file_id`
    pub job_id: String,
    pub message: String,
}

fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
