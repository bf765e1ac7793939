//! Document Template MCP Server Library
//!
//! This crate provides MCP tools for document templates:
//! - `extract_tags`: List or validate `{{tag}}` placeholders in a DOCX
//! - `replace_tags` / `replace_answer_ids`: Substitute tags from JSON data
//! - `populate_questionnaire` / `supporting_documents`: Fill DOCX tables
//! - `extract_fillable_fields` / `fill_pdf_form`: Work with PDF AcroForms
//! - `envelope_to_base64` / `save_document`: Move documents in and out

pub mod answers;
pub mod docx;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;
pub mod template;

pub use error::{Error, Result};
pub use server::{run_server, run_server_with_config, DocServer, ServerConfig};
