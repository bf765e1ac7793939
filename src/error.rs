//! Error types for the document template server

use thiserror::Error;

/// Result type alias for the document template server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document template server
#[derive(Error, Debug)]
pub enum Error {
    /// A required tool parameter was absent or empty
    #[error("Missing required input: {field}")]
    MissingInput { field: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Bytes are not a readable DOCX package
    #[error("Invalid DOCX file: {reason}")]
    InvalidDocx { reason: String },

    /// Bytes are not a readable PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// JSON input could not be parsed
    #[error("Invalid JSON input: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A form field named in the input does not exist in the document
    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    /// The document has no table to operate on
    #[error("Document has no table")]
    MissingTable,

    /// Writing the modified document failed
    #[error("Failed to write document: {reason}")]
    DocumentWrite { reason: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// The PDFium library could not be bound at runtime
    #[error("PDFium unavailable: {reason}")]
    PdfiumUnavailable { reason: String },

    /// lopdf error
    #[error("PDF object error: {0}")]
    PdfObject(#[from] lopdf::Error),

    /// Path access denied (outside allowed output directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// A blocking document task panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::MissingInput { field } => format!("Missing required input: {}", field),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::InvalidDocx { .. } => "Invalid DOCX file".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::InvalidJson(e) => format!("Invalid JSON input: {}", e),
            Error::FieldNotFound { name } => format!("Field not found: {}", name),
            Error::MissingTable => "Document has no table".to_string(),
            Error::DocumentWrite { .. } => "Failed to write document".to_string(),
            Error::SourceResolution { reason } => format!("Failed to fetch document: {}", reason),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::PdfiumUnavailable { .. } => "PDF processing error".to_string(),
            Error::PdfObject(_) => "PDF processing error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::TaskJoin(_) => "Internal processing error".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_internal_reason() {
        let err = Error::InvalidDocx {
            reason: "zip: invalid central directory at /tmp/x".to_string(),
        };
        assert_eq!(err.client_message(), "Invalid DOCX file");
        assert!(err.to_string().contains("central directory"));
    }

    #[test]
    fn test_client_message_keeps_user_facing_detail() {
        let err = Error::MissingInput {
            field: "base64Document".to_string(),
        };
        assert_eq!(
            err.client_message(),
            "Missing required input: base64Document"
        );
    }
}
