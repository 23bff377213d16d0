//! Incremental index construction in fixed-size embedding batches

use tracing::debug;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, VectorRecord};

use super::vector_index::VectorIndex;

/// Receives `(done, total)` chunk counts after every appended batch
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, done: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, done: usize, total: usize) {
        self(done, total)
    }
}

/// Observer that ignores progress
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _done: usize, _total: usize) {}
}

/// Builds a [`VectorIndex`] batch by batch
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    batch_size: usize,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(5)
    }
}

impl IndexBuilder {
    /// A zero batch size is treated as 1
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Embed `chunks` in order and append them batch by batch
    ///
    /// Every vector must have the length the embedder reports through
    /// [`EmbeddingProvider::dimensions`]. Returns `None` for empty input without
    /// calling the embedder or the observer. The observer sees exactly
    /// `ceil(N / batch_size)` calls with strictly increasing `done`, the last
    /// one with `done == N`. On any failure the partial index is dropped.
    pub async fn build_incremental(
        &self,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
        observer: &dyn ProgressObserver,
    ) -> Result<Option<VectorIndex>> {
        if chunks.is_empty() {
            return Ok(None);
        }

        if let Some(pos) = chunks.iter().position(|c| c.text.trim().is_empty()) {
            return Err(Error::ingestion(format!("chunk {} has no text", pos)));
        }

        let total = chunks.len();
        let dimensions = embedder.dimensions();
        let mut index = VectorIndex::new(dimensions);
        let mut done = 0;

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} texts in batch {}",
                    embedder.name(),
                    vectors.len(),
                    batch.len(),
                    batch_no + 1
                )));
            }

            if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
                return Err(Error::embedding(format!(
                    "{} returned a {}-dimension vector in batch {}, expected {}",
                    embedder.name(),
                    bad.len(),
                    batch_no + 1,
                    dimensions
                )));
            }

            let records: Vec<VectorRecord> = vectors
                .into_iter()
                .zip(batch.iter().cloned())
                .map(|(vector, chunk)| VectorRecord::new(vector, chunk))
                .collect();

            index.insert_batch(records)?;

            done += batch.len();
            debug!("Indexed batch {} ({}/{} chunks)", batch_no + 1, done, total);
            observer.on_progress(done, total);
        }

        Ok(Some(index))
    }
}
