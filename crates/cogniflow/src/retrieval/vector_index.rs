//! Flat cosine-similarity index with incremental inserts and checksummed persistence
//!
//! Records are kept in insertion order next to their precomputed norms, so an
//! insert only touches the new vectors and a search is one exact scan. The
//! on-disk form is
//!
//! ```text
//! "CFVX" | format version (u32 LE) | SHA-256(payload) | bincode payload
//! ```
//!
//! and `load` either returns a complete index or an error, never a partial one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Chunk, VectorRecord};

const MAGIC: &[u8; 4] = b"CFVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 32;

/// Search result with chunk and similarity
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity to the query (-1.0..=1.0, higher is better)
    pub similarity: f32,
    /// Insertion position of the record inside its index
    pub position: usize,
}

/// In-memory vector index over embedded chunks
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimensions: usize,
    records: Vec<VectorRecord>,
    norms: Vec<f32>,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    dimensions: u64,
    records: Vec<PersistedRecordRef<'a>>,
}

#[derive(Serialize)]
struct PersistedRecordRef<'a> {
    vector: &'a [f32],
    text: &'a str,
    // bincode cannot carry self-describing JSON values, so metadata travels as text
    metadata_json: String,
}

#[derive(Deserialize)]
struct PersistedIndex {
    dimensions: u64,
    records: Vec<PersistedRecord>,
}

#[derive(Deserialize)]
struct PersistedRecord {
    vector: Vec<f32>,
    text: String,
    metadata_json: String,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimensions` components
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            records: Vec::new(),
            norms: Vec::new(),
        }
    }

    /// Vector length accepted by this index
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Append a batch of records
    ///
    /// The whole batch is validated first; a rejected batch leaves the index untouched.
    pub fn insert_batch(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        for (i, record) in records.iter().enumerate() {
            self.validate_vector(&record.vector)
                .map_err(|e| Error::index(format!("record {} of batch: {}", i, e)))?;
        }

        self.records.reserve(records.len());
        self.norms.reserve(records.len());
        for record in records {
            self.norms.push(norm(&record.vector));
            self.records.push(record);
        }

        Ok(())
    }

    /// Return up to `k` records nearest to `query`, most similar first
    ///
    /// Ties are broken by insertion order so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.records.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(Error::index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (record, record_norm))| {
                (i, cosine(query, query_norm, &record.vector, *record_norm))
            })
            .collect();

        let by_rank = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_by(by_rank);

        Ok(scored
            .into_iter()
            .map(|(position, similarity)| SearchHit {
                chunk: self.records[position].chunk.clone(),
                similarity,
                position,
            })
            .collect())
    }

    /// Persist the index atomically (unique temp file + rename)
    ///
    /// Concurrent saves to the same path never share a temp file; the last
    /// rename wins. Returns the hex SHA-256 of the payload, as reported by
    /// [`VectorIndex::load_with_digest`].
    pub fn save(&self, path: &Path) -> Result<String> {
        let records = self
            .records
            .iter()
            .map(|r| {
                Ok(PersistedRecordRef {
                    vector: &r.vector,
                    text: &r.chunk.text,
                    metadata_json: serde_json::to_string(&r.chunk.metadata)
                        .map_err(|e| Error::persistence(path, e.to_string()))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let persisted = PersistedIndexRef {
            dimensions: self.dimensions as u64,
            records,
        };

        let payload = bincode::serde::encode_to_vec(&persisted, bincode::config::standard())
            .map_err(|e| Error::persistence(path, format!("encode failed: {}", e)))?;
        let checksum = Sha256::digest(&payload);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::persistence(path, e.to_string()))?;

        // An unpersisted temp file is removed on drop
        let write_result = (|| -> std::io::Result<()> {
            let mut file = tempfile::NamedTempFile::new_in(dir)?;
            file.write_all(MAGIC)?;
            file.write_all(&FORMAT_VERSION.to_le_bytes())?;
            file.write_all(&checksum)?;
            file.write_all(&payload)?;
            file.as_file().sync_all()?;
            file.persist(path).map_err(|e| e.error)?;
            Ok(())
        })();

        write_result.map_err(|e| Error::persistence(path, e.to_string()))?;

        tracing::debug!(
            "Saved index with {} records ({} bytes) to {}",
            self.records.len(),
            HEADER_LEN + payload.len(),
            path.display()
        );

        Ok(hex::encode(checksum))
    }

    /// Load a persisted index; any defect in the file yields an error and no index
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_digest(path).map(|(index, _)| index)
    }

    /// Load a persisted index together with the hex SHA-256 of its payload
    pub fn load_with_digest(path: &Path) -> Result<(Self, String)> {
        let bytes = fs::read(path).map_err(|e| Error::persistence(path, e.to_string()))?;

        if bytes.len() < HEADER_LEN {
            return Err(Error::persistence(path, "file truncated"));
        }
        let (magic, rest) = bytes.split_at(4);
        if magic != MAGIC {
            return Err(Error::persistence(path, "not an index file"));
        }
        let (version, rest) = rest.split_at(4);
        let version = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
        if version != FORMAT_VERSION {
            return Err(Error::persistence(
                path,
                format!("unsupported format version {}", version),
            ));
        }
        let (expected, payload) = rest.split_at(32);
        let actual = Sha256::digest(payload);
        if actual.as_slice() != expected {
            return Err(Error::persistence(
                path,
                format!(
                    "checksum mismatch (expected {}, found {})",
                    hex::encode(expected),
                    hex::encode(actual)
                ),
            ));
        }

        let (persisted, consumed): (PersistedIndex, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard())
                .map_err(|e| Error::persistence(path, format!("decode failed: {}", e)))?;
        if consumed != payload.len() {
            return Err(Error::persistence(path, "trailing bytes after payload"));
        }

        let dimensions = usize::try_from(persisted.dimensions)
            .map_err(|_| Error::persistence(path, "dimension out of range"))?;
        let records = persisted
            .records
            .into_iter()
            .map(|r| {
                let metadata: BTreeMap<String, serde_json::Value> =
                    serde_json::from_str(&r.metadata_json)
                        .map_err(|e| Error::persistence(path, format!("bad metadata: {}", e)))?;
                Ok(VectorRecord::new(
                    r.vector,
                    Chunk {
                        text: r.text,
                        metadata,
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut index = Self::new(dimensions);
        index
            .insert_batch(records)
            .map_err(|e| Error::persistence(path, e.to_string()))?;

        tracing::debug!("Loaded index with {} records from {}", index.len(), path.display());

        Ok((index, hex::encode(actual)))
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::index(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::index("vector contains NaN or infinite values"));
        }
        Ok(())
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, vector: &[f32], vector_norm: f32) -> f32 {
    if query_norm == 0.0 || vector_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(vector).map(|(a, b)| a * b).sum();
    dot / (query_norm * vector_norm)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn record(vector: Vec<f32>, text: &str) -> VectorRecord {
        VectorRecord::new(vector, Chunk::new(text).with_metadata("source", "test.pdf"))
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new(3);
        index
            .insert_batch(vec![
                record(vec![1.0, 0.0, 0.0], "x axis"),
                record(vec![0.0, 1.0, 0.0], "y axis"),
                record(vec![0.7, 0.7, 0.0], "diagonal"),
            ])
            .unwrap();
        index
            .insert_batch(vec![record(vec![0.0, 0.0, 1.0], "z axis")])
            .unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.1, 0.0], 3).unwrap();

        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["x axis", "diagonal", "y axis"]);
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_search_returns_fewer_than_k() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0, 1.0], 10).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].chunk.text, "z axis");
        assert!(index.search(&[0.0, 0.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(3);
        assert!(matches!(index.search(&[1.0, 0.0, 0.0], 3), Err(Error::EmptyIndex)));
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .insert_batch(vec![
                record(vec![1.0, 0.0], "first"),
                record(vec![2.0, 0.0], "second"),
                record(vec![0.0, 1.0], "other"),
                record(vec![3.0, 0.0], "third"),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.text, "first");
        assert_eq!(hits[1].chunk.text, "second");
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_rejected_batch_leaves_index_unchanged() {
        let mut index = sample_index();
        let result = index.insert_batch(vec![
            record(vec![1.0, 1.0, 1.0], "ok"),
            record(vec![1.0, 1.0], "short"),
        ]);
        assert!(matches!(result, Err(Error::Index(_))));
        assert_eq!(index.len(), 4);

        let result = index.insert_batch(vec![record(vec![f32::NAN, 0.0, 0.0], "nan")]);
        assert!(result.is_err());
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample_index();
        assert!(matches!(index.search(&[1.0, 0.0], 1), Err(Error::Index(_))));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let mut index = VectorIndex::new(2);
        index
            .insert_batch(vec![record(vec![0.0, 0.0], "blank"), record(vec![1.0, 0.0], "x")])
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.text, "x");
        assert_eq!(hits[1].similarity, 0.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.idx");

        let mut index = sample_index();
        index
            .insert_batch(vec![VectorRecord::new(
                vec![0.123_456_7, -0.987_654_3, 1e-30],
                Chunk::new("Столиця України - Київ.")
                    .with_metadata("page", 3)
                    .with_metadata("source", "geo.pdf")
                    .with_metadata("tags", serde_json::json!(["capital", "ukraine"])),
            )])
            .unwrap();

        let saved_digest = tokio_test::assert_ok!(index.save(&path));
        let (loaded, loaded_digest) = tokio_test::assert_ok!(VectorIndex::load_with_digest(&path));
        assert_eq!(saved_digest, loaded_digest);
        assert_eq!(saved_digest.len(), 64);

        assert_eq!(loaded.dimensions(), index.dimensions());
        assert_eq!(loaded.records(), index.records());
        for query in [[1.0, 0.0, 0.0], [0.1, -0.9, 0.3], [0.0, 0.0, 0.0]] {
            assert_eq!(
                loaded.search(&query, 5).unwrap(),
                index.search(&query, 5).unwrap()
            );
        }
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_concurrent_saves_to_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = std::sync::Arc::new(dir.path().join("shared.idx"));

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let path = std::sync::Arc::clone(&path);
                std::thread::spawn(move || {
                    let mut index = VectorIndex::new(2);
                    let records = (0..100)
                        .map(|i| VectorRecord::new(vec![1.0, i as f32], Chunk::new(format!("writer {}", w))))
                        .collect();
                    index.insert_batch(records).unwrap();
                    (0..20).map(|_| index.save(&path).unwrap()).last().unwrap()
                })
            })
            .collect();

        let digests: Vec<String> = writers.into_iter().map(|w| w.join().unwrap()).collect();

        let (loaded, digest) = VectorIndex::load_with_digest(&path).unwrap();
        assert!(digests.contains(&digest));
        let text = &loaded.records()[0].chunk.text;
        assert!(loaded.records().iter().all(|r| &r.chunk.text == text));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_rejects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.idx");
        sample_index().save(&path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            VectorIndex::load(&path),
            Err(Error::IndexPersistence { message, .. }) if message.contains("checksum")
        ));

        fs::write(&path, &bytes[..10]).unwrap();
        tokio_test::assert_err!(VectorIndex::load(&path));

        fs::write(&path, b"NOPE0000000000000000000000000000000000000000").unwrap();
        tokio_test::assert_err!(VectorIndex::load(&path));

        tokio_test::assert_err!(VectorIndex::load(&dir.path().join("missing.idx")));
    }
}
