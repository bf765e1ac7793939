//! PDF form layer
//!
//! Field listing goes through PDFium when the library can be bound and
//! falls back to walking the AcroForm dictionaries with lopdf. Filling is
//! always done on the AcroForm dictionaries with lopdf.

mod acroform;
mod layout;
mod reader;
mod values;

pub use acroform::{fill_form_fields, list_acroform_fields, FillReport, SkippedField};
pub use layout::{order_fields, FieldEntry, FieldPosition};
pub use reader::extract_form_fields;
pub use values::{normalize_value, sanitize_field_name, sanitize_json};

use crate::error::{Error, Result};

/// Kind of an interactive form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    Dropdown,
    ListBox,
    PushButton,
    Signature,
    Unknown,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio_button",
            FieldKind::Dropdown => "combo_box",
            FieldKind::ListBox => "list_box",
            FieldKind::PushButton => "push_button",
            FieldKind::Signature => "signature",
            FieldKind::Unknown => "unknown",
        }
    }
}

/// A form field as listed for extraction
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldInfo {
    /// Page number of the first widget (1-indexed), when known
    pub page: Option<u32>,
    /// Fully qualified field name
    pub name: String,
    pub kind: FieldKind,
    /// Lower-left corner of the first widget
    pub position: Option<FieldPosition>,
}

impl FormFieldInfo {
    pub fn entry(&self) -> FieldEntry {
        FieldEntry {
            name: self.name.clone(),
            position: self.position.unwrap_or(FieldPosition::UNPLACED),
        }
    }
}

/// Validate the `%PDF` header before handing bytes to a parser
pub(crate) fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}
