//! Document loading and text splitting

pub mod loader;
pub mod splitter;

pub use loader::{DocumentLoader, FileLoader};
pub use splitter::TextSplitter;
