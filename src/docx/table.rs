use super::document::paragraph_text;
use super::DocxDocument;
use crate::answers::QuestionRow;
use crate::error::{Error, Result};
use docx_rs::{Paragraph, Run, TableCell, TableCellContent, TableChild, TableRow, TableRowChild};
use std::collections::HashSet;

/// A `caseField/placeholder` pair for the supporting documents table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTagPair {
    pub field: String,
    pub placeholder: String,
}

/// Parse `"field/tag,field/tag"`; elements without exactly two parts are dropped.
///
/// Trailing empty parts do not count, so `"a/"` is dropped while `"/b"` is kept.
pub fn parse_fields_and_tags(input: &str) -> Vec<FieldTagPair> {
    input
        .split(',')
        .filter_map(|element| {
            let mut parts: Vec<&str> = element.split('/').collect();
            while parts.last() == Some(&"") {
                parts.pop();
            }
            match parts.as_slice() {
                [field, placeholder] => Some(FieldTagPair {
                    field: field.to_string(),
                    placeholder: placeholder.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

impl DocxDocument {
    /// Replace every row below the header of the first table with one row
    /// per question. Returns the number of rows written.
    pub fn populate_questionnaire(&mut self, rows: &[QuestionRow]) -> Result<usize> {
        let table = self.first_table_mut().ok_or(Error::MissingTable)?;
        let width = header_width(&table.rows);

        table.rows.truncate(1);
        for row in rows {
            table.rows.push(new_row(
                &[
                    row.group.as_str(),
                    row.question.as_str(),
                    row.answers.as_str(),
                ],
                width,
            ));
        }

        Ok(rows.len())
    }

    /// Fill the first table from field/tag pairs, then drop duplicate rows.
    ///
    /// The template row at index 1 is removed first. Returns the number of
    /// rows left below the header.
    pub fn fill_supporting_documents(&mut self, pairs: &[FieldTagPair]) -> Result<usize> {
        let table = self.first_table_mut().ok_or(Error::MissingTable)?;
        let width = header_width(&table.rows);

        if table.rows.len() > 1 {
            table.rows.remove(1);
        }
        for pair in pairs {
            table
                .rows
                .push(new_row(&[pair.field.as_str(), pair.placeholder.as_str()], width));
        }

        let before = table.rows.len();
        let mut seen = HashSet::new();
        let mut index = 0usize;
        table.rows.retain(|row| {
            let keep = index == 0 || seen.insert(row_text(row));
            index += 1;
            keep
        });
        tracing::debug!(removed = before - table.rows.len(), "duplicate rows removed");

        Ok(table.rows.len().saturating_sub(1))
    }
}

fn header_width(rows: &[TableChild]) -> usize {
    rows.first()
        .map(|row| {
            let TableChild::TableRow(row) = row;
            row.cells.len()
        })
        .unwrap_or(0)
}

fn new_row(values: &[&str], width: usize) -> TableChild {
    let cells = (0..width.max(values.len()))
        .map(|i| {
            let paragraph = match values.get(i) {
                Some(value) => Paragraph::new().add_run(Run::new().add_text(*value)),
                None => Paragraph::new(),
            };
            TableCell::new().add_paragraph(paragraph)
        })
        .collect();
    TableChild::TableRow(TableRow::new(cells))
}

/// Cell texts each followed by a comma; used as the duplicate key
fn row_text(row: &TableChild) -> String {
    let TableChild::TableRow(row) = row;
    let mut text = String::new();
    for cell in &row.cells {
        let TableRowChild::TableCell(cell) = cell;
        let paragraphs: Vec<String> = cell
            .children
            .iter()
            .filter_map(|content| match content {
                TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                _ => None,
            })
            .collect();
        text.push_str(&paragraphs.join("\n"));
        text.push(',');
    }
    text
}
