//! Query-time retrieval with fallback to the default session

use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

use super::session_store::{SessionStore, DEFAULT_SESSION};
use super::vector_index::{SearchHit, VectorIndex};

/// Resolves a session and searches it for a query
pub struct ContextRetriever {
    sessions: Arc<SessionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ContextRetriever {
    pub fn new(sessions: Arc<SessionStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { sessions, embedder }
    }

    /// Index for `session_id`, else the default session
    pub fn resolve(&self, session_id: Option<&str>) -> Result<(String, Arc<VectorIndex>)> {
        if let Some(id) = session_id {
            if let Some(index) = self.sessions.get(id) {
                return Ok((id.to_string(), index));
            }
        }

        self.sessions
            .get(DEFAULT_SESSION)
            .map(|index| (DEFAULT_SESSION.to_string(), index))
            .ok_or_else(|| Error::SessionNotFound(session_id.unwrap_or(DEFAULT_SESSION).to_string()))
    }

    /// Top `k` chunks for `query`
    pub async fn retrieve(&self, session_id: Option<&str>, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let (resolved, index) = self.resolve(session_id)?;
        let query_vector = self.embedder.embed(query).await?;
        let hits = index.search(&query_vector, k)?;

        debug!("Retrieved {} chunks from session {}", hits.len(), resolved);
        Ok(hits)
    }
}
