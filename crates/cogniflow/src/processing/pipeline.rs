//! Background ingestion: load, split, embed, publish
//!
//! Each upload runs as its own task. Stage progress goes to the [`JobTracker`];
//! the built index is published to the [`SessionStore`] only after the whole
//! build succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::{DocumentLoader, TextSplitter};
use crate::providers::EmbeddingProvider;
use crate::retrieval::{IndexBuilder, SessionStore, VectorIndex, DEFAULT_SESSION};

use super::job_tracker::{JobState, JobTracker};

/// Ingestion workflow shared by all upload tasks
pub struct IngestionPipeline {
    loader: Arc<dyn DocumentLoader>,
    splitter: TextSplitter,
    builder: IndexBuilder,
    embedder: Arc<dyn EmbeddingProvider>,
    jobs: Arc<JobTracker>,
    sessions: Arc<SessionStore>,
    cache_dir: Option<PathBuf>,
    /// Held while the default is replaced and cached, so both follow the same job
    default_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        splitter: TextSplitter,
        builder: IndexBuilder,
        embedder: Arc<dyn EmbeddingProvider>,
        jobs: Arc<JobTracker>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            loader,
            splitter,
            builder,
            embedder,
            jobs,
            sessions,
            cache_dir: None,
            default_lock: Mutex::new(()),
        }
    }

    /// Pipeline configured from `config`, persisting the default index when enabled
    pub fn from_config(
        config: &RagConfig,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        jobs: Arc<JobTracker>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let pipeline = Self::new(
            loader,
            TextSplitter::from_config(&config.chunking),
            IndexBuilder::new(config.index.batch_size),
            embedder,
            jobs,
            sessions,
        );
        if config.index.persist_default {
            pipeline.with_cache_dir(config.storage.cache_dir.clone())
        } else {
            pipeline
        }
    }

    /// Save each successful index as the cached default under `dir`
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Register job `id` and ingest `path` in the background
    ///
    /// The job exists in the tracker before this returns, so status polling
    /// right after upload never reports an unknown id.
    pub fn spawn(self: &Arc<Self>, id: String, path: PathBuf, source: String) -> JoinHandle<()> {
        self.jobs.start(&id);
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            // The outcome is already on the job record
            if let Err(e) = pipeline.process(&id, &path, &source).await {
                debug!("Background job {} ended with error: {}", id, e);
            }
        })
    }

    /// Ingest `path` as job `id` and wait for the outcome
    ///
    /// Returns the number of indexed chunks. The job record reflects the
    /// outcome either way.
    pub async fn run(&self, id: &str, path: &Path, source: &str) -> Result<usize> {
        self.jobs.start(id);
        self.process(id, path, source).await
    }

    async fn process(&self, id: &str, path: &Path, source: &str) -> Result<usize> {
        info!("Ingesting {} as job {}", source, id);

        match self.build(id, path, source).await {
            Ok(Some(index)) => {
                let count = index.len();
                let index = Arc::new(index);
                self.sessions.put(id, Arc::clone(&index));
                self.publish_default(index, path).await;

                self.jobs.complete(id, format!("Indexed {} chunks", count));
                info!("Job {} completed: {} chunks indexed", id, count);
                Ok(count)
            }
            Ok(None) => {
                self.jobs.complete(id, "Document contained no text");
                warn!("Job {} completed without text: {}", id, source);
                Ok(0)
            }
            Err(e) => {
                error!("Job {} failed: {}", id, e);
                self.jobs.fail(id, e.to_string());
                Err(e)
            }
        }
    }

    async fn build(&self, id: &str, path: &Path, source: &str) -> Result<Option<VectorIndex>> {
        self.jobs.set_stage(id, JobState::Loading, 10, "Loading document");
        let loader = Arc::clone(&self.loader);
        let owned_path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || loader.load(&owned_path))
            .await
            .map_err(|e| Error::internal(format!("loader task failed: {}", e)))??;

        self.jobs.set_stage(id, JobState::Chunking, 20, "Splitting text");
        let chunks: Vec<_> = self
            .splitter
            .split_pages(&pages, source)
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect();

        if chunks.is_empty() {
            return Ok(None);
        }

        self.jobs.record_vectorizing(id, 0, chunks.len());
        let jobs = Arc::clone(&self.jobs);
        let job_id = id.to_string();
        let observer = move |done: usize, total: usize| {
            jobs.record_vectorizing(&job_id, done, total);
        };

        self.builder
            .build_incremental(&chunks, self.embedder.as_ref(), &observer)
            .await
    }

    async fn publish_default(&self, index: Arc<VectorIndex>, source: &Path) {
        let _guard = self.default_lock.lock().await;
        self.sessions.put(DEFAULT_SESSION, Arc::clone(&index));

        let Some(cache_dir) = self.cache_dir.clone() else {
            return;
        };
        let source = source.to_path_buf();
        let saved = tokio::task::spawn_blocking(move || {
            SessionStore::save_default_to_cache(&cache_dir, &index, &source)
        })
        .await;

        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to cache default index: {}", e),
            Err(e) => warn!("Cache task failed: {}", e),
        }
    }
}
