//! DOCX and Markdown conversion tests.

mod common;

use std::io::Cursor;

use common::zip;
use folio::transform::stylesheets;
use folio::{Docx, Error, Markdown, Result, Rewrites};

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body>
</w:document>"#;

fn docx(parts: &[(&str, &str)]) -> Vec<u8> {
    let entries: Vec<(&str, String)> = parts.iter().map(|(n, c)| (*n, c.to_string())).collect();
    zip(&entries)
}

// ============================================================================
// DOCX
// ============================================================================

#[test]
fn test_docx_package() {
    let bytes = docx(&[
        ("word/numbering.xml", "<?xml version=\"1.0\"?>\n<w:numbering/>"),
        ("word/document.xml", DOCUMENT),
        ("word/footnotes.xml", "<w:footnotes/>"),
        ("word/_rels/document.xml.rels", "<Relationships/>"),
        ("word/media/image1.png", "not xml"),
    ]);
    let package = Docx::from_reader(Cursor::new(bytes)).unwrap().package().unwrap();

    let names: Vec<&str> = package
        .match_indices("pkg:name=\"")
        .map(|(i, _)| {
            let rest = &package[i + 10..];
            &rest[..rest.find('"').unwrap()]
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "/word/document.xml",
            "/word/_rels/document.xml.rels",
            "/word/footnotes.xml",
            "/word/numbering.xml",
        ]
    );
    assert_eq!(package.matches("<?xml").count(), 1);
    assert!(package.contains("<w:t>Hello</w:t>"));
    assert!(!package.contains("not xml"));
}

#[test]
fn test_docx_without_document() {
    let bytes = docx(&[("word/styles.xml", "<w:styles/>")]);
    let result = Docx::from_reader(Cursor::new(bytes)).unwrap().package();
    assert!(matches!(result, Err(Error::MissingElement(_))));
}

#[test]
fn test_docx_open_and_tei() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.docx");
    std::fs::write(&path, docx(&[("word/document.xml", DOCUMENT)])).unwrap();

    let calls = std::cell::RefCell::new(Vec::new());
    let transform = |stylesheet: &str, xml: &str, params: &[(&str, &str)]| -> Result<String> {
        calls.borrow_mut().push(stylesheet.to_string());
        if stylesheet == stylesheets::DOCX_TEMPLATE {
            assert_eq!(params, &[("template", "docx/default.xml")]);
        }
        Ok(xml.replace("Hello", "Hello!"))
    };
    let tei = Docx::open(&path)
        .unwrap()
        .with_rewrites(Rewrites::parse("search\treplace\n!!\t?\n"))
        .tei(&transform)
        .unwrap();

    assert_eq!(
        *calls.borrow(),
        vec![
            stylesheets::DOCX_TEILIKE,
            stylesheets::DOCX_DIVS,
            stylesheets::DOCX_TEMPLATE
        ]
    );
    assert!(tei.contains("<w:t>Hello!?</w:t>"), "{tei}");
}

// ============================================================================
// Markdown
// ============================================================================

#[test]
fn test_markdown_file_to_article() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    std::fs::write(
        &path,
        "# Notes\n\nIntro with a note[^n].\n\n## Part\n\nBody & more.\n\n[^n]: The note.\n",
    )
    .unwrap();

    let html = Markdown::open(&path).unwrap().html();

    assert!(html.starts_with("<article xmlns=\"http://www.w3.org/1999/xhtml\">\n  <section>\n<h1>Notes</h1>"));
    assert!(html.contains("<section>\n<h2>Part</h2>"));
    assert!(html.contains("Body &amp; more."));
    assert!(html.contains("<section class=\"footnotes\">"));
    assert_eq!(html.matches("<section").count(), html.matches("</section>").count());
    assert!(html.ends_with("</article>\n"));
}

#[test]
fn test_markdown_missing_file() {
    let result = Markdown::open("/nonexistent/notes.md");
    assert!(matches!(result, Err(Error::Io(_))));
}
