//! MCP Server implementation using rmcp

use crate::answers::{Questionnaire, ANSWER_TREE_ROOT, QUESTIONNAIRE_TABLE_ROOT};
use crate::docx::{parse_fields_and_tags, DocxDocument};
use crate::error::Error;
use crate::pdf::{extract_form_fields, fill_form_fields, order_fields, sanitize_json};
use crate::source::{decode_base64, encode_base64, resolve_url, FetchOptions};
use crate::template::{
    scan, substitute, ScanMode, SubstitutionMap, TracingObserver, DEFAULT_MAX_TAG_LENGTH,
};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Security and resource configuration for the document template server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories `save_document` may write into; empty allows any path
    pub output_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for envelope fetches (default: 100MB)
    pub max_download_bytes: u64,
    /// Longest inner tag name accepted by permissive scans (default: 50)
    pub max_tag_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            output_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            max_tag_length: DEFAULT_MAX_TAG_LENGTH,
        }
    }
}

/// Document template MCP Server
#[derive(Clone)]
pub struct DocServer {
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeParams {
    /// URL of the signed envelope PDF
    #[serde(default)]
    pub url: String,
    /// Value sent verbatim as the Authorization header
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractFieldsParams {
    /// Base64 encoded PDF
    #[serde(default)]
    pub base64_document: String,
    /// Order fields by position (bottom to top, then left to right)
    #[serde(default)]
    pub ordered: bool,
    /// Reverse the final list
    #[serde(default)]
    pub reverse_order: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTagsParams {
    /// Base64 encoded DOCX
    #[serde(default)]
    pub base64_document: String,
    /// Tag grammar: "strict" accepts only {{name}}, "permissive" also accepts {name}} and {{name} and checks tag length
    #[serde(default)]
    pub mode: ScanMode,
    /// Reverse the final list
    #[serde(default)]
    pub reverse_order: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FillPdfFormParams {
    /// Base64 encoded PDF with an AcroForm
    #[serde(default)]
    pub base64_document: String,
    /// Flat JSON object of field name to value, as text
    #[serde(default)]
    pub json_case: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceTagsParams {
    /// Base64 encoded DOCX
    #[serde(default)]
    pub base64_document: String,
    /// Flat JSON object of tag (with braces) to replacement, as text
    #[serde(default)]
    pub tag_data: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerTreeParams {
    /// Base64 encoded DOCX
    #[serde(default)]
    pub base64_document: String,
    /// Answer tree JSON as text
    #[serde(default)]
    pub answer_tree: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportingDocumentsParams {
    /// Base64 encoded DOCX
    #[serde(default)]
    pub base64_document: String,
    /// Comma separated caseField/placeholder pairs
    #[serde(default)]
    pub fields_and_tags: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocumentParams {
    /// Base64 encoded document
    #[serde(default)]
    pub base64_document: String,
    /// Destination file path
    #[serde(default)]
    pub output_path: String,
}

fn require<'a>(value: &'a str, field: &str) -> crate::error::Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::MissingInput {
            field: field.to_string(),
        });
    }
    Ok(value)
}

fn failure(subject: &str, tool: &str, e: Error) -> String {
    tracing::warn!(error = %e, tool, "tool failed");
    format!("Error processing {}: {}", subject, e.client_message())
}

// ============================================================================
// Tools
// ============================================================================

#[tool_router]
impl DocServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new DocServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Download a PDF envelope and return it as base64
    #[tool(
        description = "Download a PDF (e.g. a signed envelope) from a URL and return it base64 encoded. The authToken is sent verbatim as the Authorization header."
    )]
    async fn envelope_to_base64(&self, Parameters(params): Parameters<EnvelopeParams>) -> String {
        self.process_envelope(&params)
            .await
            .unwrap_or_else(|e| failure("request", "envelope_to_base64", e))
    }

    /// List fillable PDF form fields
    #[tool(
        description = "List the fillable form field names of a PDF as a comma separated string. With ordered=true fields are sorted by position (ascending y, then x); reverseOrder reverses the list."
    )]
    async fn extract_fillable_fields(
        &self,
        Parameters(params): Parameters<ExtractFieldsParams>,
    ) -> String {
        self.process_extract_fields(&params)
            .await
            .unwrap_or_else(|e| failure("PDF", "extract_fillable_fields", e))
    }

    /// Extract or validate template tags in a DOCX
    #[tool(
        description = "Extract template tags from a DOCX, body paragraphs first, then table cells. Returns the tags comma separated, \"No tags found in the document\", or in permissive mode a list of issues for tags longer than the limit."
    )]
    async fn extract_tags(&self, Parameters(params): Parameters<ExtractTagsParams>) -> String {
        self.process_extract_tags(&params)
            .await
            .unwrap_or_else(|e| failure("DOCX file", "extract_tags", e))
    }

    /// Fill a PDF form from JSON
    #[tool(
        description = "Fill the AcroForm of a PDF from a flat JSON object (jsonCase) of field name to value. Text, checkbox, radio and dropdown fields are supported; unknown field names are skipped. Returns the filled PDF base64 encoded."
    )]
    async fn fill_pdf_form(&self, Parameters(params): Parameters<FillPdfFormParams>) -> String {
        self.process_fill_form(&params)
            .await
            .unwrap_or_else(|e| failure("PDF", "fill_pdf_form", e))
    }

    /// Replace tags in a DOCX from a flat map
    #[tool(
        description = "Replace tags in a DOCX using a flat JSON object (tagData) whose keys are the literal tags, braces included. Returns the rewritten DOCX base64 encoded."
    )]
    async fn replace_tags(&self, Parameters(params): Parameters<ReplaceTagsParams>) -> String {
        self.process_replace_tags(&params)
            .await
            .unwrap_or_else(|e| failure("DOCX file", "replace_tags", e))
    }

    /// Replace {{ID}} tags in a DOCX from an answer tree
    #[tool(
        description = "Replace {{GroupID}}, {{QuestionID}} and {{AnswerID}} tags in a DOCX with their names from an answer tree rooted at \"Questionnaire\". Returns the rewritten DOCX base64 encoded."
    )]
    async fn replace_answer_ids(&self, Parameters(params): Parameters<AnswerTreeParams>) -> String {
        self.process_replace_answer_ids(&params)
            .await
            .unwrap_or_else(|e| failure("DOCX file", "replace_answer_ids", e))
    }

    /// Fill the questionnaire table of a DOCX
    #[tool(
        description = "Rewrite the first table of a DOCX with one row per question (group, question, answers) from an answer tree rooted at \"Q1\". The header row is kept. Returns the DOCX base64 encoded."
    )]
    async fn populate_questionnaire(&self, Parameters(params): Parameters<AnswerTreeParams>) -> String {
        self.process_populate_questionnaire(&params)
            .await
            .unwrap_or_else(|e| failure("DOCX file", "populate_questionnaire", e))
    }

    /// Fill the supporting documents table of a DOCX
    #[tool(
        description = "Fill the first table of a DOCX from \"caseField/placeholder\" pairs (comma separated), replacing the template row and dropping duplicate rows. Returns the DOCX base64 encoded."
    )]
    async fn supporting_documents(
        &self,
        Parameters(params): Parameters<SupportingDocumentsParams>,
    ) -> String {
        self.process_supporting_documents(&params)
            .await
            .unwrap_or_else(|e| failure("DOCX file", "supporting_documents", e))
    }

    /// Decode a base64 document to a file
    #[tool(
        description = "Decode a base64 document and write it to outputPath. Returns the written path. When output directories are configured the path must be inside one of them."
    )]
    async fn save_document(&self, Parameters(params): Parameters<SaveDocumentParams>) -> String {
        self.process_save_document(&params)
            .await
            .unwrap_or_else(|e| failure("request", "save_document", e))
    }
}

impl DocServer {
    /// Validate that an output path is within allowed output directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.output_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = match path_obj.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        let canonical_target =
            canonical_parent.join(path_obj.file_name().unwrap_or(std::ffi::OsStr::new("")));

        for dir in &self.config.output_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Write output data to a file path, with sandbox validation.
    fn write_output(&self, path_str: &str, data: &[u8]) -> crate::error::Result<String> {
        self.validate_output_path_access(path_str)?;

        let path = Path::new(path_str);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, data)?;
        Ok(path_str.to_string())
    }

    pub async fn process_envelope(&self, params: &EnvelopeParams) -> crate::error::Result<String> {
        let url = require(&params.url, "url")?;
        let options = FetchOptions {
            allow_private_urls: self.config.allow_private_urls,
            max_download_bytes: self.config.max_download_bytes,
        };

        let data = resolve_url(url, params.auth_token.as_deref(), &options).await?;
        Ok(encode_base64(&data))
    }

    pub async fn process_extract_fields(
        &self,
        params: &ExtractFieldsParams,
    ) -> crate::error::Result<String> {
        let data = decode_base64(require(&params.base64_document, "base64Document")?)?;
        let ordered = params.ordered;
        let reverse = params.reverse_order;

        let names = tokio::task::spawn_blocking(move || {
            let fields = extract_form_fields(&data)?;
            tracing::info!(fields = fields.len(), ordered, "form fields extracted");

            let names = if ordered {
                order_fields(fields.iter().map(|f| f.entry()).collect(), reverse)
            } else {
                let mut names: Vec<String> = fields.into_iter().map(|f| f.name).collect();
                if reverse {
                    names.reverse();
                }
                names
            };
            Ok::<_, Error>(names)
        })
        .await??;

        Ok(names.join(","))
    }

    pub async fn process_extract_tags(
        &self,
        params: &ExtractTagsParams,
    ) -> crate::error::Result<String> {
        let data = decode_base64(require(&params.base64_document, "base64Document")?)?;
        let mode = params.mode;
        let reverse = params.reverse_order;
        let max_len = self.config.max_tag_length;

        tokio::task::spawn_blocking(move || {
            let document = DocxDocument::from_bytes(&data)?;
            let outcome = scan(&document.text_blocks(), mode, max_len, &TracingObserver);
            tracing::info!(
                tags = outcome.tags.len(),
                issues = outcome.issues.len(),
                ?mode,
                "tags scanned"
            );
            Ok::<_, Error>(outcome.report(reverse))
        })
        .await?
    }

    pub async fn process_fill_form(&self, params: &FillPdfFormParams) -> crate::error::Result<String> {
        let data = decode_base64(require(&params.base64_document, "base64Document")?)?;
        let json = sanitize_json(require(&params.json_case, "jsonCase")?);
        let values: Map<String, Value> = serde_json::from_str(&json)?;
        let pairs: Vec<(String, Value)> = values.into_iter().collect();

        let (filled, report) = tokio::task::spawn_blocking(move || fill_form_fields(&data, &pairs)).await??;
        tracing::info!(
            filled = report.filled,
            skipped = report.skipped.len(),
            "PDF form filled"
        );

        Ok(encode_base64(&filled))
    }

    async fn rewrite_docx(&self, base64_document: &str, map: SubstitutionMap) -> crate::error::Result<String> {
        let data = decode_base64(require(base64_document, "base64Document")?)?;

        let bytes = tokio::task::spawn_blocking(move || {
            let mut document = DocxDocument::from_bytes(&data)?;
            let rewrites = substitute(&document.text_blocks(), &map, &TracingObserver);
            let applied = document.apply_rewrites(&rewrites);
            tracing::info!(tags = map.len(), blocks = applied, "tags replaced");
            document.into_bytes()
        })
        .await??;

        Ok(encode_base64(&bytes))
    }

    pub async fn process_replace_tags(
        &self,
        params: &ReplaceTagsParams,
    ) -> crate::error::Result<String> {
        let tag_data: Map<String, Value> = serde_json::from_str(require(&params.tag_data, "tagData")?)?;
        self.rewrite_docx(&params.base64_document, SubstitutionMap::from_json_object(&tag_data))
            .await
    }

    pub async fn process_replace_answer_ids(
        &self,
        params: &AnswerTreeParams,
    ) -> crate::error::Result<String> {
        let tree = Questionnaire::from_json(require(&params.answer_tree, "answerTree")?, ANSWER_TREE_ROOT)?;
        self.rewrite_docx(&params.base64_document, tree.substitution_map())
            .await
    }

    pub async fn process_populate_questionnaire(
        &self,
        params: &AnswerTreeParams,
    ) -> crate::error::Result<String> {
        let data = decode_base64(require(&params.base64_document, "base64Document")?)?;
        let tree = Questionnaire::from_json(
            require(&params.answer_tree, "answerTree")?,
            QUESTIONNAIRE_TABLE_ROOT,
        )?;

        let bytes = tokio::task::spawn_blocking(move || {
            let mut document = DocxDocument::from_bytes(&data)?;
            let rows = document.populate_questionnaire(&tree.rows())?;
            tracing::info!(rows, "questionnaire table populated");
            document.into_bytes()
        })
        .await??;

        Ok(encode_base64(&bytes))
    }

    pub async fn process_supporting_documents(
        &self,
        params: &SupportingDocumentsParams,
    ) -> crate::error::Result<String> {
        let data = decode_base64(require(&params.base64_document, "base64Document")?)?;
        let pairs = parse_fields_and_tags(&params.fields_and_tags);

        let bytes = tokio::task::spawn_blocking(move || {
            let mut document = DocxDocument::from_bytes(&data)?;
            let rows = document.fill_supporting_documents(&pairs)?;
            tracing::info!(pairs = pairs.len(), rows, "supporting documents table filled");
            document.into_bytes()
        })
        .await??;

        Ok(encode_base64(&bytes))
    }

    pub async fn process_save_document(
        &self,
        params: &SaveDocumentParams,
    ) -> crate::error::Result<String> {
        let data = decode_base64(require(&params.base64_document, "base64Document")?)?;
        let output_path = require(&params.output_path, "outputPath")?;

        let written = self.write_output(output_path, &data)?;
        tracing::info!(path = %written, bytes = data.len(), "document saved");
        Ok(written)
    }
}

impl Default for DocServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for DocServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Document template server: extract and replace {{tags}} in DOCX templates, \
                 fill DOCX tables from answer trees, list and fill PDF form fields, and \
                 transcode documents to and from base64."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = DocServer::with_config(config);

    tracing::info!("Document template MCP Server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
