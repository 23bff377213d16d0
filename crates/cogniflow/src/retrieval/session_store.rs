//! Registry of published session indexes and the on-disk default cache
//!
//! Readers take an `Arc` snapshot, so a concurrent `put` of the same id swaps
//! the entry without invalidating searches already running on the old index.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::vector_index::VectorIndex;

/// Session id that unmatched queries fall back to
pub const DEFAULT_SESSION: &str = "default";

const CACHE_INDEX_FILE: &str = "default.idx";
const CACHE_MANIFEST_FILE: &str = "default.json";

/// Describes the cached default index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheManifest {
    /// Document the index was built from
    pub source: PathBuf,
    pub records: usize,
    pub dimensions: usize,
    /// Hex SHA-256 of the index payload this manifest describes
    pub index_sha256: String,
    pub saved_at: DateTime<Utc>,
}

/// Session id to index registry
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<VectorIndex>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact lookup, no fallback
    pub fn get(&self, id: &str) -> Option<Arc<VectorIndex>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Publish or replace the index for `id`
    pub fn put(&self, id: impl Into<String>, index: Arc<VectorIndex>) {
        self.sessions.insert(id.into(), index);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Registered session ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Adopt the cached default index if it is intact and its source still exists
    ///
    /// Every failure is logged and reported as `false`; the store is untouched then.
    pub fn load_default_from_cache(&self, cache_dir: &Path) -> bool {
        match read_cache(cache_dir) {
            Ok(Some((manifest, index))) => {
                info!(
                    "Loaded cached default index ({} records) for {}",
                    index.len(),
                    manifest.source.display()
                );
                self.put(DEFAULT_SESSION, Arc::new(index));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Ignoring cached default index: {}", e);
                false
            }
        }
    }

    /// Write `index` and its manifest as the cached default
    ///
    /// Both files are replaced atomically. The manifest carries the index
    /// digest, so a manifest paired with another writer's index is rejected
    /// on load. Callers that publish and cache the default serialize the two
    /// steps themselves.
    pub fn save_default_to_cache(cache_dir: &Path, index: &VectorIndex, source: &Path) -> Result<()> {
        fs::create_dir_all(cache_dir).map_err(|e| Error::persistence(cache_dir, e.to_string()))?;

        let digest = index.save(&cache_dir.join(CACHE_INDEX_FILE))?;

        let manifest = CacheManifest {
            source: source.to_path_buf(),
            records: index.len(),
            dimensions: index.dimensions(),
            index_sha256: digest,
            saved_at: Utc::now(),
        };
        let manifest_path = cache_dir.join(CACHE_MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(&manifest)?;
        let written = (|| -> std::io::Result<()> {
            let mut file = tempfile::NamedTempFile::new_in(cache_dir)?;
            file.write_all(&json)?;
            file.as_file().sync_all()?;
            file.persist(&manifest_path).map_err(|e| e.error)?;
            Ok(())
        })();
        written.map_err(|e| Error::persistence(&manifest_path, e.to_string()))?;

        Ok(())
    }
}

fn read_cache(cache_dir: &Path) -> Result<Option<(CacheManifest, VectorIndex)>> {
    let manifest_path = cache_dir.join(CACHE_MANIFEST_FILE);
    if !manifest_path.exists() {
        return Ok(None);
    }

    let raw = fs::read(&manifest_path).map_err(|e| Error::persistence(&manifest_path, e.to_string()))?;
    let manifest: CacheManifest = serde_json::from_slice(&raw)
        .map_err(|e| Error::persistence(&manifest_path, format!("bad manifest: {}", e)))?;

    if !manifest.source.exists() {
        return Err(Error::persistence(
            &manifest_path,
            format!("source document {} no longer exists", manifest.source.display()),
        ));
    }

    let (index, digest) = VectorIndex::load_with_digest(&cache_dir.join(CACHE_INDEX_FILE))?;
    if digest != manifest.index_sha256 {
        return Err(Error::persistence(
            &manifest_path,
            format!(
                "manifest describes index {}, cache holds {}",
                manifest.index_sha256, digest
            ),
        ));
    }
    if index.len() != manifest.records || index.dimensions() != manifest.dimensions {
        return Err(Error::persistence(
            &manifest_path,
            "manifest does not match cached index",
        ));
    }

    Ok(Some((manifest, index)))
}
