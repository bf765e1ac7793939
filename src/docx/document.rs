use crate::error::{Error, Result};
use crate::template::{BlockOrigin, Rewrite, TextBlock};
use docx_rs::{
    read_docx, Docx, DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild,
    Table, TableCellContent, TableChild, TableRowChild,
};
use std::io::Cursor;

/// A DOCX package loaded into memory
pub struct DocxDocument {
    docx: Docx,
}

impl std::fmt::Debug for DocxDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocxDocument")
            .field("children", &self.docx.document.children.len())
            .finish()
    }
}

impl DocxDocument {
    /// Parse DOCX bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        // DOCX is a ZIP package
        if data.len() < 4 || &data[0..2] != b"PK" {
            return Err(Error::InvalidDocx {
                reason: "Not a DOCX (ZIP) package".to_string(),
            });
        }

        let docx = read_docx(data).map_err(|e| Error::InvalidDocx {
            reason: e.to_string(),
        })?;

        Ok(Self { docx })
    }

    pub fn from_docx(docx: Docx) -> Self {
        Self { docx }
    }

    /// Serialize the document back into DOCX bytes
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.docx
            .build()
            .pack(Cursor::new(&mut buf))
            .map_err(|e| Error::DocumentWrite {
                reason: e.to_string(),
            })?;
        Ok(buf)
    }

    /// Text of every paragraph, body paragraphs first, then table cells in
    /// row-major, cell-major order.
    pub fn text_blocks(&self) -> Vec<TextBlock> {
        let mut body: Vec<&Paragraph> = Vec::new();
        let mut tables: Vec<&Table> = Vec::new();
        for child in &self.docx.document.children {
            match child {
                DocumentChild::Paragraph(paragraph) => body.push(paragraph),
                DocumentChild::Table(table) => tables.push(table),
                _ => {}
            }
        }

        let mut blocks: Vec<TextBlock> = body
            .into_iter()
            .enumerate()
            .map(|(index, p)| TextBlock::new(paragraph_text(p), BlockOrigin::Paragraph { index }))
            .collect();

        for (table_index, table) in tables.into_iter().enumerate() {
            for (row_index, row) in table.rows.iter().enumerate() {
                let TableChild::TableRow(row) = row;
                for (cell_index, cell) in row.cells.iter().enumerate() {
                    let TableRowChild::TableCell(cell) = cell;
                    let paragraphs = cell.children.iter().filter_map(|content| match content {
                        TableCellContent::Paragraph(p) => Some(p),
                        _ => None,
                    });
                    for (paragraph_index, p) in paragraphs.enumerate() {
                        blocks.push(TextBlock::new(
                            paragraph_text(p),
                            BlockOrigin::TableCell {
                                table: table_index,
                                row: row_index,
                                cell: cell_index,
                                paragraph: paragraph_index,
                            },
                        ));
                    }
                }
            }
        }

        blocks
    }

    /// Write rewritten block text back into the matching paragraphs.
    ///
    /// A rewritten paragraph loses all of its runs and receives one plain
    /// run with the new text (none when the text is empty). Returns the
    /// number of paragraphs rewritten.
    pub fn apply_rewrites(&mut self, rewrites: &[Rewrite]) -> usize {
        let mut paragraphs = self.paragraphs_mut();
        let mut applied = 0;

        for rewrite in rewrites {
            match paragraphs.get_mut(rewrite.block) {
                Some(paragraph) => {
                    set_paragraph_text(paragraph, &rewrite.text);
                    applied += 1;
                }
                None => {
                    tracing::warn!(block = rewrite.block, origin = ?rewrite.origin, "rewrite target missing");
                }
            }
        }

        applied
    }

    /// First table in the document body
    pub fn first_table_mut(&mut self) -> Option<&mut Table> {
        for child in self.docx.document.children.iter_mut() {
            if let DocumentChild::Table(table) = child {
                let table: &mut Table = table;
                return Some(table);
            }
        }
        None
    }

    /// Paragraphs in the same order as [`Self::text_blocks`]
    fn paragraphs_mut(&mut self) -> Vec<&mut Paragraph> {
        let mut paragraphs: Vec<&mut Paragraph> = Vec::new();
        let mut tables: Vec<&mut Table> = Vec::new();
        for child in self.docx.document.children.iter_mut() {
            match child {
                DocumentChild::Paragraph(paragraph) => paragraphs.push(paragraph),
                DocumentChild::Table(table) => tables.push(table),
                _ => {}
            }
        }

        for table in tables {
            for row in table.rows.iter_mut() {
                let TableChild::TableRow(row) = row;
                for cell in row.cells.iter_mut() {
                    let TableRowChild::TableCell(cell) = cell;
                    for content in cell.children.iter_mut() {
                        if let TableCellContent::Paragraph(p) = content {
                            paragraphs.push(p);
                        }
                    }
                }
            }
        }

        paragraphs
    }
}

/// Concatenated text of a paragraph's runs, including runs nested in
/// hyperlinks and tracked insertions
pub(crate) fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_children_text(&paragraph.children, &mut text);
    text
}

fn push_children_text(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run_text(run, text),
            ParagraphChild::Hyperlink(link) => push_children_text(&link.children, text),
            ParagraphChild::Insert(insert) => {
                for insert_child in &insert.children {
                    if let InsertChild::Run(run) = insert_child {
                        push_run_text(run, text);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_run_text(run: &Run, text: &mut String) {
    for run_child in &run.children {
        if let RunChild::Text(t) = run_child {
            text.push_str(&t.text);
        }
    }
}

/// Children that contribute to [`paragraph_text`]
fn carries_text(child: &ParagraphChild) -> bool {
    matches!(
        child,
        ParagraphChild::Run(_) | ParagraphChild::Hyperlink(_) | ParagraphChild::Insert(_)
    )
}

fn set_paragraph_text(paragraph: &mut Paragraph, text: &str) {
    paragraph.children.retain(|child| !carries_text(child));
    if text.is_empty() {
        return;
    }

    let stripped = std::mem::replace(paragraph, Paragraph::new());
    *paragraph = stripped.add_run(Run::new().add_text(text));
}
