//! DOCX processing layer
//!
//! This module wraps docx-rs: reading a package into text blocks, writing
//! tag rewrites back into paragraphs, and editing the first table.

mod document;
mod table;

pub use document::DocxDocument;
pub use table::{parse_fields_and_tags, FieldTagPair};
