//! Template tag engine
//!
//! Scanning and substitution operate on a flat list of [`TextBlock`] values
//! rather than on a document library's object graph. The DOCX layer turns a
//! document into blocks and applies the resulting rewrites back.

mod observer;
mod scanner;
mod substitute;

pub use observer::{NoopObserver, TagObserver, TracingObserver};
pub use scanner::{scan, ScanMode, ScanOutcome, DEFAULT_MAX_TAG_LENGTH};
pub use substitute::{apply_rewrites, scalar_text, substitute, Rewrite, SubstitutionMap};

/// Where a block's text came from in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Top-level body paragraph (index among body paragraphs)
    Paragraph { index: usize },
    /// Paragraph inside a table cell
    TableCell {
        table: usize,
        row: usize,
        cell: usize,
        paragraph: usize,
    },
}

/// One paragraph's worth of document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub content: String,
    pub origin: BlockOrigin,
}

impl TextBlock {
    pub fn new(content: impl Into<String>, origin: BlockOrigin) -> Self {
        Self {
            content: content.into(),
            origin,
        }
    }

    /// Convenience constructor for a body paragraph block
    pub fn paragraph(index: usize, content: impl Into<String>) -> Self {
        Self::new(content, BlockOrigin::Paragraph { index })
    }
}

/// A tag occurrence found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Matched text including brackets, e.g. `{{Q01}}`
    pub raw: String,
    /// Text between the brackets, e.g. `Q01`
    pub inner: String,
    /// Byte offset of the match inside its block
    pub start: usize,
    /// Index of the block in the scanned sequence
    pub block: usize,
}
