//! Integration tests for the document template server

use doc_template_mcp::docx::DocxDocument;
use doc_template_mcp::pdf::{extract_form_fields, list_acroform_fields};
use doc_template_mcp::server::{
    AnswerTreeParams, ExtractFieldsParams, ExtractTagsParams, FillPdfFormParams,
    ReplaceTagsParams, SaveDocumentParams, SupportingDocumentsParams,
};
use doc_template_mcp::source::{decode_base64, encode_base64};
use doc_template_mcp::template::ScanMode;
use doc_template_mcp::{DocServer, ServerConfig};
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use lopdf::{dictionary, Document, Object};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn para(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn table(rows: &[&[&str]]) -> Table {
    Table::new(
        rows.iter()
            .map(|cells| {
                TableRow::new(
                    cells
                        .iter()
                        .map(|c| TableCell::new().add_paragraph(para(c)))
                        .collect(),
                )
            })
            .collect(),
    )
}

fn docx_base64(docx: Docx) -> String {
    let bytes = DocxDocument::from_docx(docx)
        .into_bytes()
        .expect("Failed to pack DOCX");
    encode_base64(&bytes)
}

fn docx_texts(base64: &str) -> Vec<String> {
    let bytes = decode_base64(base64).expect("Result should be base64");
    DocxDocument::from_bytes(&bytes)
        .expect("Result should be a DOCX")
        .text_blocks()
        .into_iter()
        .map(|b| b.content)
        .collect()
}

/// Three text fields: Top (50,700), BottomRight (300,100), BottomLeft (50,100)
fn form_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let mut widgets = Vec::new();
    for (name, x, y) in [("Top", 50, 700), ("BottomRight", 300, 100), ("BottomLeft", 50, 100)] {
        widgets.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(name),
            "Rect" => vec![x.into(), y.into(), (x + 150).into(), (y + 20).into()],
            "P" => Object::Reference(page_id),
        })));
    }

    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Annots" => widgets.clone(),
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let acroform = doc.add_object(dictionary! { "Fields" => widgets });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
        "AcroForm" => Object::Reference(acroform),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("Failed to save PDF");
    buffer
}

/// `/V` of the field whose `/T` is `name`
fn pdf_field_value(data: &[u8], name: &str) -> Option<String> {
    let doc = Document::load_mem(data).expect("Output should be a PDF");
    doc.objects.values().find_map(|obj| match obj {
        Object::Dictionary(d) => match (d.get(b"T"), d.get(b"V")) {
            (Ok(Object::String(t, _)), Ok(Object::String(v, _))) if t.as_slice() == name.as_bytes() => {
                Some(String::from_utf8_lossy(v).into_owned())
            }
            _ => None,
        },
        _ => None,
    })
}

#[tokio::test]
async fn test_extract_then_replace_then_extract() {
    let server = DocServer::new();
    let doc = docx_base64(
        Docx::new()
            .add_paragraph(para("Hello {{NAME}}"))
            .add_table(table(&[&["{{CITY}}", "static"]])),
    );

    let tags = server
        .process_extract_tags(&ExtractTagsParams {
            base64_document: doc.clone(),
            mode: ScanMode::Strict,
            reverse_order: false,
        })
        .await
        .expect("extract_tags should succeed");
    assert_eq!(tags, "{{NAME}},{{CITY}}");

    let replaced = server
        .process_replace_tags(&ReplaceTagsParams {
            base64_document: doc,
            tag_data: r#"{"{{NAME}}": "World", "{{CITY}}": "Paris"}"#.to_string(),
        })
        .await
        .expect("replace_tags should succeed");
    assert_eq!(docx_texts(&replaced), vec!["Hello World", "Paris", "static"]);

    let tags = server
        .process_extract_tags(&ExtractTagsParams {
            base64_document: replaced.clone(),
            mode: ScanMode::Strict,
            reverse_order: false,
        })
        .await
        .expect("extract_tags should succeed");
    assert_eq!(tags, "No tags found in the document");

    // Replacing again is a no-op
    let again = server
        .process_replace_tags(&ReplaceTagsParams {
            base64_document: replaced,
            tag_data: r#"{"{{NAME}}": "World"}"#.to_string(),
        })
        .await
        .expect("replace_tags should succeed");
    assert_eq!(docx_texts(&again), vec!["Hello World", "Paris", "static"]);
}

#[tokio::test]
async fn test_permissive_scan_accepts_broken_braces() {
    let server = DocServer::new();
    let doc = docx_base64(Docx::new().add_paragraph(para("{X}} and {{Y}")));
    let tags = server
        .process_extract_tags(&ExtractTagsParams {
            base64_document: doc,
            mode: ScanMode::Permissive,
            reverse_order: true,
        })
        .await
        .expect("extract_tags should succeed");
    assert_eq!(tags, "{{Y},{X}}");
}

#[rstest]
#[case(50, "{{A}}")]
#[case(51, "Issues found:\nTag is too long")]
#[tokio::test]
async fn test_permissive_length_boundary(#[case] length: usize, #[case] expected_prefix: &str) {
    let server = DocServer::new();
    let name = "a".repeat(length);
    let doc = docx_base64(Docx::new().add_paragraph(para(&format!("{{{{{name}}}}} {{{{A}}}}"))));
    let report = server
        .process_extract_tags(&ExtractTagsParams {
            base64_document: doc,
            mode: ScanMode::Permissive,
            reverse_order: true,
        })
        .await
        .expect("extract_tags should succeed");
    assert!(
        report.starts_with(expected_prefix),
        "unexpected report: {report}"
    );
}

#[tokio::test]
async fn test_supporting_documents_table() {
    let server = DocServer::new();
    let doc = docx_base64(
        Docx::new()
            .add_paragraph(para("Supporting documents"))
            .add_table(table(&[&["Field", "Tag"], &["template", "row"]])),
    );
    let result = server
        .process_supporting_documents(&SupportingDocumentsParams {
            base64_document: doc,
            fields_and_tags: "Passport/{{P}},Visa/{{V}},Passport/{{P}},broken".to_string(),
        })
        .await
        .expect("supporting_documents should succeed");
    assert_eq!(
        docx_texts(&result),
        vec!["Supporting documents", "Field", "Tag", "Passport", "{{P}}", "Visa", "{{V}}"]
    );
}

#[tokio::test]
async fn test_populate_questionnaire_table() {
    let server = DocServer::new();
    let doc = docx_base64(Docx::new().add_table(table(&[
        &["Group", "Question", "Answers"],
        &["x", "y", "z"],
    ])));
    let tree = r#"{"Q1": {"QuestionGroup": [
        {"QuestionGroupID": "G1", "Name": "Travel", "Question": [
            {"QuestionID": "Q1", "Name": "Countries?", "Answer": [
                {"AnswerID": "A1", "Name": "France"},
                {"AnswerID": "A2", "Name": "Spain"}
            ]},
            {"QuestionID": "Q2", "Name": "Visa?", "Answer": {"AnswerID": "A3", "Name": "Yes"}}
        ]}
    ]}}"#;
    let result = server
        .process_populate_questionnaire(&AnswerTreeParams {
            base64_document: doc,
            answer_tree: tree.to_string(),
        })
        .await
        .expect("populate_questionnaire should succeed");
    assert_eq!(
        docx_texts(&result),
        vec![
            "Group", "Question", "Answers",
            "Travel", "Countries?", "France, Spain",
            "Travel", "Visa?", "Yes",
        ]
    );
}

#[test]
fn test_form_fields_listed_in_document_order() {
    let fields = extract_form_fields(&form_pdf()).expect("Failed to list form fields");
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Top", "BottomRight", "BottomLeft"]);
}

#[rstest]
#[case(false, false, "Top,BottomRight,BottomLeft")]
#[case(false, true, "BottomLeft,BottomRight,Top")]
#[case(true, false, "BottomLeft,BottomRight,Top")]
#[case(true, true, "Top,BottomRight,BottomLeft")]
#[tokio::test]
async fn test_extract_fillable_fields(
    #[case] ordered: bool,
    #[case] reverse_order: bool,
    #[case] expected: &str,
) {
    let server = DocServer::new();
    let result = server
        .process_extract_fields(&ExtractFieldsParams {
            base64_document: encode_base64(&form_pdf()),
            ordered,
            reverse_order,
        })
        .await
        .expect("extract_fillable_fields should succeed");
    assert_eq!(result, expected);
}

#[tokio::test]
async fn test_fill_pdf_form_with_raw_control_characters() {
    let server = DocServer::new();
    let json_case = "{\"Top\": \"line1\nline2\", \"  BottomLeft \": 12.5, \"Nope\": true}";
    let result = server
        .process_fill_form(&FillPdfFormParams {
            base64_document: encode_base64(&form_pdf()),
            json_case: json_case.to_string(),
        })
        .await
        .expect("fill_pdf_form should succeed");

    let filled = decode_base64(&result).expect("Result should be base64");
    assert_eq!(pdf_field_value(&filled, "Top").as_deref(), Some("line1\nline2"));
    assert_eq!(pdf_field_value(&filled, "BottomLeft").as_deref(), Some("12.50"));
    assert_eq!(pdf_field_value(&filled, "BottomRight"), None);
    assert_eq!(list_acroform_fields(&filled).expect("still a form").len(), 3);
}

#[tokio::test]
async fn test_error_strings_name_the_subject() {
    let server = DocServer::new();
    let bad = "not valid base64!!!".to_string();

    let docx_error = server
        .process_replace_answer_ids(&AnswerTreeParams {
            base64_document: bad.clone(),
            answer_tree: "{}".to_string(),
        })
        .await
        .expect_err("malformed base64 must fail");
    assert_eq!(docx_error.client_message(), "Invalid base64 data");

    let pdf_error = server
        .process_fill_form(&FillPdfFormParams {
            base64_document: encode_base64(b"PK\x03\x04 not a pdf"),
            json_case: "{}".to_string(),
        })
        .await
        .expect_err("non-PDF must fail");
    assert_eq!(pdf_error.client_message(), "Invalid PDF file");

    let docx_error = server
        .process_extract_tags(&ExtractTagsParams {
            base64_document: encode_base64(b"%PDF-1.7"),
            mode: ScanMode::Strict,
            reverse_order: false,
        })
        .await
        .expect_err("PDF bytes are not a DOCX");
    assert_eq!(docx_error.client_message(), "Invalid DOCX file");
}

#[test]
fn test_save_document_writes_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let server = DocServer::with_config(ServerConfig {
        output_dirs: vec![dir.path().to_string_lossy().to_string()],
        ..ServerConfig::default()
    });
    let target = dir.path().join("saved.docx");
    let params = SaveDocumentParams {
        base64_document: format!("  {}\n", encode_base64(b"PK\x03\x04payload")),
        output_path: target.to_string_lossy().to_string(),
    };

    let written = tokio_test::block_on(server.process_save_document(&params))
        .expect("save_document should succeed");
    assert_eq!(written, target.to_string_lossy());
    assert_eq!(
        std::fs::read(&target).expect("File should exist"),
        b"PK\x03\x04payload"
    );
}
