//! Form field listing with PDFium

use super::acroform::list_acroform_fields;
use super::layout::FieldPosition;
use super::{check_pdf_header, FieldKind, FormFieldInfo};
use crate::error::{Error, Result};
use pdfium_render::prelude::*;
use std::collections::HashSet;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::PdfiumUnavailable {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// List the form fields of a PDF, one entry per field name.
///
/// Widgets are visited page by page in annotation order; a field with
/// several widgets is reported once, placed at its first widget. When the
/// PDFium library cannot be bound the AcroForm dictionaries are read
/// directly instead.
pub fn extract_form_fields(data: &[u8]) -> Result<Vec<FormFieldInfo>> {
    check_pdf_header(data)?;

    match create_pdfium() {
        Ok(pdfium) => extract_with_pdfium(&pdfium, data),
        Err(e) => {
            tracing::warn!(error = %e, "falling back to AcroForm field listing");
            list_acroform_fields(data)
        }
    }
}

fn extract_with_pdfium(pdfium: &Pdfium, data: &[u8]) -> Result<Vec<FormFieldInfo>> {
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| Error::Pdfium {
            reason: format!("{}", e),
        })?;

    let mut fields = Vec::new();
    let mut seen = HashSet::new();

    for (index, page) in document.pages().iter().enumerate() {
        let page_num = index as u32 + 1;

        for annotation in page.annotations().iter() {
            let Some(field) = annotation.as_form_field() else {
                continue;
            };
            let Some(name) = field.name() else {
                continue;
            };
            if !seen.insert(name.clone()) {
                continue;
            }

            let kind = if field.as_text_field().is_some() {
                FieldKind::Text
            } else if field.as_checkbox_field().is_some() {
                FieldKind::Checkbox
            } else if field.as_radio_button_field().is_some() {
                FieldKind::Radio
            } else if field.as_combo_box_field().is_some() {
                FieldKind::Dropdown
            } else if field.as_list_box_field().is_some() {
                FieldKind::ListBox
            } else if field.as_push_button_field().is_some() {
                FieldKind::PushButton
            } else if field.as_signature_field().is_some() {
                FieldKind::Signature
            } else {
                FieldKind::Unknown
            };

            let position = annotation.bounds().ok().map(|rect| FieldPosition {
                x: rect.left().value,
                y: rect.bottom().value,
            });

            tracing::trace!(page = page_num, field = %name, kind = kind.as_str(), "form field");
            fields.push(FormFieldInfo {
                page: Some(page_num),
                name,
                kind,
                position,
            });
        }
    }

    Ok(fields)
}
