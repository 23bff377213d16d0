//! Chunk and record types flowing from ingestion into the vector index

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Supported upload formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a file name or path
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension used when storing uploads
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Markdown => "md",
        }
    }
}

/// Text of one page as produced by a loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    /// Extracted text
    pub text: String,
}

/// A segment of source text with its metadata; the unit that gets indexed and retrieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub text: String,
    /// Metadata attached by the splitter (`source`, `page`, `chunk_index`, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Create a chunk without metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Source file name, if tagged
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }

    /// Page number, if tagged
    pub fn page(&self) -> Option<u32> {
        self.metadata
            .get("page")
            .and_then(|v| v.as_u64())
            .map(|p| p as u32)
    }
}

/// An embedded chunk as stored in a vector index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Embedding of `chunk.text`
    pub vector: Vec<f32>,
    /// The chunk the vector was computed from
    pub chunk: Chunk,
}

impl VectorRecord {
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path("notes/lecture.PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_path("readme.md"), Some(FileType::Markdown));
        assert_eq!(FileType::from_path("essay.txt"), Some(FileType::Txt));
        assert_eq!(FileType::from_path("slides.pptx"), None);
        assert_eq!(FileType::from_path("no_extension"), None);
    }

    #[test]
    fn test_chunk_metadata_accessors() {
        let chunk = Chunk::new("Mitochondria is the powerhouse of the cell.")
            .with_metadata("source", "biology.pdf")
            .with_metadata("page", 4);

        assert_eq!(chunk.source(), Some("biology.pdf"));
        assert_eq!(chunk.page(), Some(4));
        assert_eq!(Chunk::new("bare").page(), None);
    }
}
