//! Application state for the tutoring server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::ConversationEngine;
use crate::ingestion::FileLoader;
use crate::processing::{IngestionPipeline, JobTracker};
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use crate::retrieval::{ContextRetriever, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Embedding provider
    embedding_provider: Arc<dyn EmbeddingProvider>,
    /// LLM provider
    llm_provider: Arc<dyn LlmProvider>,
    /// Ingestion job statuses
    jobs: Arc<JobTracker>,
    /// Published session indexes
    sessions: Arc<SessionStore>,
    /// Upload processing
    pipeline: Arc<IngestionPipeline>,
    /// Query-time retrieval
    retriever: ContextRetriever,
    /// Tutor reply generation
    engine: ConversationEngine,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state backed by the configured Ollama server
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing CogniFlow application state...");

        let (embedder, llm) = OllamaProvider::new(&config.llm, config.embeddings.dimensions)?.split();
        tracing::info!(
            "Ollama providers initialized (embeddings: {}, chat: {})",
            config.llm.embed_model,
            config.llm.chat_model
        );

        let state = Self::with_providers(config, Arc::new(embedder), Arc::new(llm))?;

        if state.restore_default_cache() {
            tracing::info!("Default session restored from cache");
        }
        state.set_ready(true);

        Ok(state)
    }

    /// Create state around explicit providers
    pub fn with_providers(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.uploads_dir).map_err(|e| {
            Error::Config(format!(
                "cannot create uploads directory {}: {}",
                config.storage.uploads_dir.display(),
                e
            ))
        })?;

        let jobs = Arc::new(JobTracker::new());
        let sessions = Arc::new(SessionStore::new());
        let pipeline = Arc::new(IngestionPipeline::from_config(
            &config,
            Arc::new(FileLoader::new()),
            Arc::clone(&embedding_provider),
            Arc::clone(&jobs),
            Arc::clone(&sessions),
        ));
        let retriever = ContextRetriever::new(Arc::clone(&sessions), Arc::clone(&embedding_provider));
        let engine = ConversationEngine::from_config(Arc::clone(&llm_provider), &config.conversation);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                embedding_provider,
                llm_provider,
                jobs,
                sessions,
                pipeline,
                retriever,
                engine,
                ready: RwLock::new(false),
            }),
        })
    }

    /// Adopt the cached default index when persistence is enabled
    pub fn restore_default_cache(&self) -> bool {
        let config = &self.inner.config;
        config.index.persist_default
            && self.inner.sessions.load_default_from_cache(&config.storage.cache_dir)
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get embedding provider
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    /// Get LLM provider
    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm_provider
    }

    pub fn jobs(&self) -> &Arc<JobTracker> {
        &self.inner.jobs
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.inner.sessions
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.inner.pipeline
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.inner.retriever
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.inner.engine
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
