//! Document loading into per-page text

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::types::{FileType, PageText};

/// Turns a stored upload into page texts
pub trait DocumentLoader: Send + Sync {
    /// Pages in document order; blank pages are dropped
    fn load(&self, path: &Path) -> Result<Vec<PageText>>;
}

/// Loader dispatching on file extension
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse already-read bytes of the given type
    pub fn load_bytes(file_type: FileType, data: &[u8]) -> Result<Vec<PageText>> {
        let raw_pages = match file_type {
            FileType::Pdf => {
                let text = pdf_extract::extract_text_from_mem(data)
                    .map_err(|e| Error::ingestion(format!("PDF extraction failed: {}", e)))?;
                // pdf-extract separates pages with form feeds when it can tell them apart
                text.split('\x0c').map(str::to_string).collect::<Vec<_>>()
            }
            FileType::Txt | FileType::Markdown => {
                let text = String::from_utf8(data.to_vec())
                    .map_err(|_| Error::ingestion("text file is not valid UTF-8"))?;
                vec![text]
            }
        };

        Ok(raw_pages
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let text = normalize_whitespace(raw);
                (!text.is_empty()).then(|| PageText {
                    page: i as u32 + 1,
                    text,
                })
            })
            .collect())
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<Vec<PageText>> {
        let file_type = FileType::from_path(path).ok_or_else(|| {
            Error::UnsupportedFileType(
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "(none)".to_string()),
            )
        })?;

        let data = std::fs::read(path)
            .map_err(|e| Error::ingestion(format!("cannot read {}: {}", path.display(), e)))?;

        let pages = Self::load_bytes(file_type, &data)?;
        tracing::debug!("Loaded {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}

/// Collapse runs of spaces/tabs, trim lines, keep at most one blank line
fn normalize_whitespace(text: &str) -> String {
    static INLINE: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let inline = INLINE.get_or_init(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));
    let blank_lines = BLANK_LINES.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let text = text.replace('\0', "").replace("\r\n", "\n");
    let text = inline.replace_all(&text, " ");
    let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
    blank_lines
        .replace_all(&trimmed.join("\n"), "\n\n")
        .trim()
        .to_string()
}
