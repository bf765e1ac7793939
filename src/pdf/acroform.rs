//! AcroForm access through lopdf
//!
//! Fields are collected by walking `/AcroForm /Fields` and the `/Kids` tree.
//! A kid that carries its own `/T` is a child field; kids without one are
//! widgets of the enclosing terminal field.

use super::layout::FieldPosition;
use super::values::{is_checked, normalize_value, radio_choice, sanitize_field_name, text_value};
use super::{check_pdf_header, FieldKind, FormFieldInfo};
use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde_json::Value;
use std::collections::HashMap;

const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const FLAG_COMBO: i64 = 1 << 17;

/// Nesting limit for the field tree; deeper kids are ignored
const MAX_FIELD_DEPTH: usize = 32;

/// A terminal field with its widgets resolved
#[derive(Debug, Clone)]
pub(crate) struct AcroField {
    pub id: ObjectId,
    pub name: String,
    pub kind: FieldKind,
    pub widgets: Vec<ObjectId>,
    /// Dropdown/list options, or radio export states
    pub options: Vec<String>,
}

/// A field that could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub name: String,
    pub reason: String,
}

/// Outcome of a fill pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub filled: usize,
    pub skipped: Vec<SkippedField>,
}

impl FillReport {
    fn skip(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(field = %name, reason = %reason, "form field skipped");
        self.skipped.push(SkippedField {
            name: name.to_string(),
            reason,
        });
    }
}

#[derive(Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    flags: i64,
}

fn load(data: &[u8]) -> Result<Document> {
    check_pdf_header(data)?;
    Document::load_mem(data).map_err(|e| Error::InvalidPdf {
        reason: e.to_string(),
    })
}

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| deref(doc, obj))
}

fn references(obj: Option<&Object>) -> Vec<ObjectId> {
    match obj {
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Reference(id) => Some(*id),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a PDF text string: UTF-16BE with a BOM, otherwise byte-per-char
fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encode a PDF text string, falling back to UTF-16BE for non-ASCII text
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

fn acroform_dict(doc: &Document) -> Result<Option<&Dictionary>> {
    let catalog = doc.catalog()?;
    match dict_entry(doc, catalog, b"AcroForm") {
        Some(Object::Dictionary(dict)) => Ok(Some(dict)),
        _ => Ok(None),
    }
}

fn field_kind(field_type: Option<&[u8]>, flags: i64) -> FieldKind {
    match field_type {
        Some(b"Tx") => FieldKind::Text,
        Some(b"Btn") if flags & FLAG_PUSHBUTTON != 0 => FieldKind::PushButton,
        Some(b"Btn") if flags & FLAG_RADIO != 0 => FieldKind::Radio,
        Some(b"Btn") => FieldKind::Checkbox,
        Some(b"Ch") if flags & FLAG_COMBO != 0 => FieldKind::Dropdown,
        Some(b"Ch") => FieldKind::ListBox,
        Some(b"Sig") => FieldKind::Signature,
        _ => FieldKind::Unknown,
    }
}

/// Names of the `/AP /N` states of a widget other than `Off`
fn on_states(doc: &Document, widget: ObjectId) -> Vec<String> {
    let Ok(Object::Dictionary(widget)) = doc.get_object(widget) else {
        return Vec::new();
    };
    let Some(Object::Dictionary(appearance)) = dict_entry(doc, widget, b"AP") else {
        return Vec::new();
    };
    let Some(Object::Dictionary(normal)) = dict_entry(doc, appearance, b"N") else {
        return Vec::new();
    };
    normal
        .iter()
        .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
        .filter(|key| key != "Off")
        .collect()
}

fn choice_options(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Some(Object::Array(items)) = dict_entry(doc, dict, b"Opt") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match deref(doc, item)? {
            Object::String(bytes, _) => Some(decode_text(bytes)),
            // [export display] pairs
            Object::Array(pair) => match pair.first() {
                Some(Object::String(bytes, _)) => Some(decode_text(bytes)),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn walk(
    doc: &Document,
    id: ObjectId,
    parent: Option<&str>,
    inherited: &Inherited,
    depth: usize,
    out: &mut Vec<AcroField>,
) {
    if depth > MAX_FIELD_DEPTH {
        tracing::warn!(?id, "field tree too deep, stopping");
        return;
    }
    let Ok(Object::Dictionary(dict)) = doc.get_object(id) else {
        return;
    };

    let partial = match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(decode_text(bytes)),
        _ => None,
    };
    let name = match (parent, partial) {
        (Some(p), Some(t)) => format!("{p}.{t}"),
        (None, Some(t)) => t,
        (Some(p), None) => p.to_string(),
        (None, None) => String::new(),
    };

    let inherited = Inherited {
        field_type: match dict.get(b"FT") {
            Ok(Object::Name(ft)) => Some(ft.clone()),
            _ => inherited.field_type.clone(),
        },
        flags: match dict.get(b"Ff") {
            Ok(Object::Integer(ff)) => *ff,
            _ => inherited.flags,
        },
    };

    let kids = references(dict_entry(doc, dict, b"Kids"));
    let (children, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids.into_iter().partition(|kid| {
        matches!(doc.get_object(*kid), Ok(Object::Dictionary(d)) if d.has(b"T"))
    });

    if !children.is_empty() {
        for child in children {
            walk(doc, child, Some(&name), &inherited, depth + 1, out);
        }
        return;
    }

    // no kids: the field dictionary is merged with its only widget
    let widgets = if widgets.is_empty() { vec![id] } else { widgets };
    let kind = field_kind(inherited.field_type.as_deref(), inherited.flags);
    let options = match kind {
        FieldKind::Dropdown | FieldKind::ListBox => choice_options(doc, dict),
        FieldKind::Radio => {
            let mut states: Vec<String> = Vec::new();
            for widget in &widgets {
                for state in on_states(doc, *widget) {
                    if !states.contains(&state) {
                        states.push(state);
                    }
                }
            }
            states
        }
        _ => Vec::new(),
    };

    out.push(AcroField {
        id,
        name,
        kind,
        widgets,
        options,
    });
}

pub(crate) fn collect_fields(doc: &Document) -> Result<Vec<AcroField>> {
    let Some(acroform) = acroform_dict(doc)? else {
        return Ok(Vec::new());
    };

    let mut fields = Vec::new();
    for id in references(dict_entry(doc, acroform, b"Fields")) {
        walk(doc, id, None, &Inherited::default(), 0, &mut fields);
    }
    Ok(fields)
}

fn widget_position(doc: &Document, widget: ObjectId) -> Option<FieldPosition> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(widget) else {
        return None;
    };
    let Some(Object::Array(rect)) = dict_entry(doc, dict, b"Rect") else {
        return None;
    };
    if rect.len() < 4 {
        return None;
    }
    let (x1, y1, x2, y2) = (
        number(&rect[0])?,
        number(&rect[1])?,
        number(&rect[2])?,
        number(&rect[3])?,
    );
    Some(FieldPosition {
        x: x1.min(x2),
        y: y1.min(y2),
    })
}

/// List fields from the AcroForm dictionaries, in document field order
pub fn list_acroform_fields(data: &[u8]) -> Result<Vec<FormFieldInfo>> {
    let doc = load(data)?;
    let page_numbers: HashMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect();

    let fields = collect_fields(&doc)?
        .into_iter()
        .map(|field| {
            let first = field.widgets.first().copied();
            let page = first.and_then(|w| match doc.get_object(w) {
                Ok(Object::Dictionary(d)) => match d.get(b"P") {
                    Ok(Object::Reference(page)) => page_numbers.get(page).copied(),
                    _ => None,
                },
                _ => None,
            });
            FormFieldInfo {
                page,
                position: first.and_then(|w| widget_position(&doc, w)),
                name: field.name,
                kind: field.kind,
            }
        })
        .collect();

    Ok(fields)
}

fn set_entry(doc: &mut Document, id: ObjectId, key: &str, value: Object) -> Result<()> {
    doc.get_object_mut(id)?.as_dict_mut()?.set(key, value);
    Ok(())
}

fn set_need_appearances(doc: &mut Document) -> Result<()> {
    let reference = match doc.catalog()?.get(b"AcroForm") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return Ok(()),
    };
    match reference {
        Some(id) => set_entry(doc, id, "NeedAppearances", Object::Boolean(true)),
        None => {
            doc.catalog_mut()?
                .get_mut(b"AcroForm")?
                .as_dict_mut()?
                .set("NeedAppearances", Object::Boolean(true));
            Ok(())
        }
    }
}

fn write_field(doc: &mut Document, field: &AcroField, value: &str, report: &mut FillReport) -> Result<()> {
    match field.kind {
        FieldKind::Dropdown => {
            if field.options.iter().any(|option| option == value) {
                set_entry(doc, field.id, "V", text_string(value))?;
                report.filled += 1;
            } else {
                set_entry(doc, field.id, "V", Object::string_literal(""))?;
                report.skip(&field.name, format!("'{value}' is not one of the dropdown options"));
            }
        }
        FieldKind::Checkbox => {
            let checked = is_checked(value);
            let mut field_state = None;
            for widget in &field.widgets {
                let state = if checked {
                    on_states(doc, *widget)
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| "Yes".to_string())
                } else {
                    "Off".to_string()
                };
                set_entry(doc, *widget, "AS", Object::Name(state.clone().into_bytes()))?;
                field_state.get_or_insert(state);
            }
            let state = field_state.unwrap_or_else(|| "Off".to_string());
            set_entry(doc, field.id, "V", Object::Name(state.into_bytes()))?;
            report.filled += 1;
        }
        FieldKind::Radio => {
            let Some(choice) = radio_choice(value, &field.options).map(str::to_string) else {
                report.skip(
                    &field.name,
                    format!("'{value}' matches none of {:?}", field.options),
                );
                return Ok(());
            };
            for widget in &field.widgets {
                let has_state = on_states(doc, *widget).contains(&choice);
                let state = if has_state { choice.as_str() } else { "Off" };
                set_entry(doc, *widget, "AS", Object::Name(state.as_bytes().to_vec()))?;
            }
            set_entry(doc, field.id, "V", Object::Name(choice.into_bytes()))?;
            report.filled += 1;
        }
        FieldKind::Text => {
            set_entry(doc, field.id, "V", text_string(text_value(value)))?;
            report.filled += 1;
        }
        FieldKind::ListBox | FieldKind::Unknown => {
            set_entry(doc, field.id, "V", text_string(value))?;
            report.filled += 1;
        }
        FieldKind::PushButton | FieldKind::Signature => {
            report.skip(&field.name, "Unsupported field type for writing");
        }
    }
    Ok(())
}

/// Fill AcroForm fields from `(name, value)` pairs.
///
/// Names are matched after sanitizing both sides. Unknown names are
/// reported and skipped; the rest of the form is still written. A PDF
/// without a form comes back re-saved with nothing filled.
pub fn fill_form_fields(data: &[u8], values: &[(String, Value)]) -> Result<(Vec<u8>, FillReport)> {
    let mut doc = load(data)?;
    let fields = collect_fields(&doc)?;
    if fields.is_empty() {
        tracing::info!("PDF has no form fields, saving unchanged");
    }

    let by_name: HashMap<String, &AcroField> = fields
        .iter()
        .rev()
        .map(|field| (sanitize_field_name(&field.name), field))
        .collect();

    let mut report = FillReport::default();
    for (name, raw) in values {
        let wanted = sanitize_field_name(name);
        let Some(field) = by_name.get(&wanted) else {
            let err = Error::FieldNotFound { name: wanted };
            report.skip(name, err.to_string());
            continue;
        };
        let value = normalize_value(raw);
        tracing::debug!(field = %field.name, kind = field.kind.as_str(), "filling field");
        write_field(&mut doc, field, &value, &mut report)?;
    }

    set_need_appearances(&mut doc)?;

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| Error::DocumentWrite {
        reason: e.to_string(),
    })?;
    Ok((out, report))
}
