//! EPUB conversion tests.
//!
//! Every fixture is a real ZIP written in memory, read back through
//! `Epub::from_reader` the way a file on disk would be.

mod common;

use std::io::Cursor;

use common::{CONTAINER, Point, ncx, ncx_item, opf, page, three_chapters, xhtml, zip};
use folio::{Epub, Error};

fn open(bytes: Vec<u8>) -> Epub {
    Epub::from_reader(Cursor::new(bytes)).unwrap()
}

fn sections(bytes: Vec<u8>) -> (String, Vec<String>) {
    let epub = open(bytes);
    let html = epub.sections().unwrap().html.clone();
    (html, epub.warnings())
}

// ============================================================================
// Reconciliation of navigation and spine
// ============================================================================

#[test]
fn test_every_spine_file_appears_once() {
    let (html, warnings) = sections(three_chapters(&[
        Point("One", "ch1.html", vec![]),
        Point("Three", "ch3.html", vec![]),
    ]));

    for word in ["alpha", "bravo", "charlie"] {
        assert_eq!(html.matches(word).count(), 1, "{word} in {html}");
    }
    assert_eq!(warnings, vec!["ch2.html: not in navigation, inserted from reading order"]);
}

#[test]
fn test_navigation_order_is_kept() {
    let (html, warnings) = sections(three_chapters(&[
        Point("One", "ch1.html", vec![]),
        Point("Two", "ch2.html", vec![]),
        Point("Three", "ch3.html", vec![]),
    ]));

    assert!(warnings.is_empty(), "{warnings:?}");
    let one = html.find("title=\"One\"").unwrap();
    let two = html.find("title=\"Two\"").unwrap();
    let three = html.find("title=\"Three\"").unwrap();
    assert!(one < two && two < three);
    assert!(html.find("alpha").unwrap() < two);
    assert!(two < html.find("bravo").unwrap() && html.find("bravo").unwrap() < three);
    assert_eq!(html.matches("<section").count(), 3);
    assert_eq!(html.matches("</section>").count(), 3);
}

#[test]
fn test_gap_interpolation() {
    let (html, warnings) = sections(three_chapters(&[
        Point("One", "ch1.html#x", vec![]),
        Point("Three", "ch3.html#y", vec![]),
    ]));

    let alpha = html.find("alpha").unwrap();
    let bravo = html.find("bravo").unwrap();
    let charlie = html.find("charlie").unwrap();
    assert!(alpha < bravo && bravo < charlie);
    assert!(bravo < html.find("title=\"Three\"").unwrap());
    assert!(html.contains("<!-- ch2.html: not in navigation, inserted from reading order -->"));
    assert_eq!(warnings.len(), 1);
}

#[test]
fn test_nested_sections() {
    let (html, _) = sections(three_chapters(&[Point(
        "Part",
        "",
        vec![
            Point("One", "ch1.html", vec![]),
            Point("Two", "ch2.html", vec![Point("Three", "ch3.html", vec![])]),
        ],
    )]));

    assert!(html.starts_with("<section class=\"ncx\" title=\"Part\">\n  <section class=\"ncx\" title=\"One\">\n"));
    assert!(html.contains("    <section class=\"ncx\" title=\"Three\">\n"));
    assert!(html.ends_with("    </section>\n  </section>\n</section>\n"));
}

#[test]
fn test_empty_label_still_opens_a_section() {
    let (html, _) = sections(three_chapters(&[
        Point("One", "ch1.html", vec![]),
        Point("", "ch2.html", vec![]),
        Point("Three", "ch3.html", vec![]),
    ]));

    let empty = html.find("title=\"\"").unwrap();
    assert!(html.find("alpha").unwrap() < empty && empty < html.find("bravo").unwrap());
}

#[test]
fn test_trailing_files_follow_last_section() {
    let (html, warnings) = sections(three_chapters(&[Point("One", "ch1.html", vec![])]));

    assert_eq!(html.matches("<section").count(), 1);
    let close = html.rfind("</section>").unwrap();
    assert!(html.find("charlie").unwrap() < close);
    assert_eq!(warnings.len(), 2);
}

// ============================================================================
// Chopping
// ============================================================================

fn single_file(body: &str, points: &[Point]) -> Vec<u8> {
    zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        (
            "OEBPS/content.opf",
            opf(&[ncx_item(), xhtml("ch1", "ch1.html")], &["ch1"], Some("ncx")),
        ),
        ("OEBPS/toc.ncx", ncx(points)),
        ("OEBPS/ch1.html", page(body)),
    ])
}

#[test]
fn test_anchor_slicing() {
    let (html, warnings) = sections(single_file(
        "<h1 id=\"a\">A</h1>text1<h1 id=\"b\">B</h1>text2",
        &[Point("A", "ch1.html#a", vec![]), Point("B", "ch1.html#b", vec![])],
    ));

    assert!(warnings.is_empty(), "{warnings:?}");
    let (first, second) = html.split_at(html.find("title=\"B\"").unwrap());
    assert!(first.contains("<h1 id=\"a\">A</h1>"));
    assert!(first.contains("text1"));
    assert!(!first.contains("text2"));
    assert!(second.contains("<h1 id=\"b\">B</h1>"));
    assert!(second.contains("text2"));
}

#[test]
fn test_missing_anchor_is_reported() {
    let (html, warnings) = sections(single_file(
        "<h1 id=\"a\">A</h1>text1",
        &[Point("A", "ch1.html#a", vec![]), Point("Z", "ch1.html#zzz", vec![])],
    ));

    assert!(!warnings.is_empty());
    assert!(warnings.iter().all(|w| w.contains("zzz")), "{warnings:?}");
    assert!(html.contains("<!-- "));
}

#[test]
fn test_entities_round_trip() {
    let (html, _) = sections(single_file(
        "<p>Fish &amp; Chips &copy; 2020 &lt;b&gt;</p>",
        &[Point("A", "ch1.html", vec![])],
    ));

    assert!(html.contains("<p>Fish &amp; Chips © 2020 &lt;b&gt;</p>"), "{html}");
}

#[test]
fn test_percent_encoded_sources() {
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        (
            "OEBPS/content.opf",
            opf(
                &[ncx_item(), xhtml("c", "Text/chapter%20one.html")],
                &["c"],
                Some("ncx"),
            ),
        ),
        ("OEBPS/toc.ncx", ncx(&[Point("One", "Text/chapter%20one.html", vec![])])),
        ("OEBPS/Text/chapter one.html", page("<p>spaced</p>")),
    ]);
    let (html, warnings) = sections(bytes);

    assert!(warnings.is_empty(), "{warnings:?}");
    assert!(html.contains("<p>spaced</p>"));
}

// ============================================================================
// Degraded navigation
// ============================================================================

#[test]
fn test_no_navigation_falls_back_to_spine() {
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        (
            "OEBPS/content.opf",
            opf(&[xhtml("ch1", "ch1.html"), xhtml("ch2", "ch2.html")], &["ch1", "ch2"], None),
        ),
        ("OEBPS/ch1.html", page("<p>alpha</p>")),
        ("OEBPS/ch2.html", page("<p>bravo</p>")),
    ]);
    let epub = open(bytes);
    let html = epub.html().unwrap();

    assert!(!html.contains("<section"));
    assert!(html.find("alpha").unwrap() < html.find("bravo").unwrap());
    let warnings = epub.warnings();
    assert_eq!(warnings.len(), 3);
    assert!(warnings[0].contains("reading order used instead"));
}

#[test]
fn test_epub3_navigation_document() {
    let nav = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
<nav epub:type="landmarks"><ol><li><a href="ch2.xhtml">Skip me</a></li></ol></nav>
<nav epub:type="toc"><ol>
  <li><a href="ch1.xhtml">One</a>
    <ol><li><a href="ch2.xhtml#s">Two</a></li></ol>
  </li>
</ol></nav>
</body>
</html>"#;
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        (
            "OEBPS/content.opf",
            opf(
                &[
                    xhtml("nav", "nav.xhtml"),
                    xhtml("ch1", "ch1.xhtml"),
                    xhtml("ch2", "ch2.xhtml"),
                ],
                &["nav", "ch1", "ch2"],
                None,
            ),
        ),
        ("OEBPS/nav.xhtml", nav.to_string()),
        ("OEBPS/ch1.xhtml", page("<p>one</p>")),
        ("OEBPS/ch2.xhtml", page("<h2 id=\"s\">Two</h2>\n<p>two</p>")),
    ]);
    let epub = open(bytes);
    let html = epub.sections().unwrap().html.clone();

    assert!(epub.warnings().is_empty(), "{:?}", epub.warnings());
    assert!(html.starts_with("<!-- nav.xhtml: boilerplate before first section, skipped -->\n"));
    assert!(!html.contains("Skip me"));
    assert!(html.contains("<section class=\"ncx\" title=\"One\">\n"));
    assert!(html.contains("  <section class=\"ncx\" title=\"Two\">\n"));
    assert!(html.find("<p>one</p>").unwrap() < html.find("<h2 id=\"s\">Two</h2>").unwrap());
}

// ============================================================================
// Package resolution
// ============================================================================

#[test]
fn test_missing_container() {
    let bytes = zip(&[("OEBPS/content.opf", String::new())]);
    let result = Epub::from_reader(Cursor::new(bytes));
    assert!(matches!(result, Err(Error::PackageNotFound(_))));
}

#[test]
fn test_missing_package_document() {
    let bytes = zip(&[("META-INF/container.xml", CONTAINER.to_string())]);
    let result = Epub::from_reader(Cursor::new(bytes));
    assert!(matches!(result, Err(Error::PackageNotFound(path)) if path == "OEBPS/content.opf"));
}

#[test]
fn test_missing_manifest_and_spine() {
    let no_manifest = "<package xmlns=\"http://www.idpf.org/2007/opf\"><metadata/><spine/></package>";
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        ("OEBPS/content.opf", no_manifest.to_string()),
    ]);
    assert!(matches!(
        Epub::from_reader(Cursor::new(bytes)),
        Err(Error::ManifestMissing(_))
    ));

    let no_spine = "<package xmlns=\"http://www.idpf.org/2007/opf\"><metadata/><manifest/></package>";
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        ("OEBPS/content.opf", no_spine.to_string()),
    ]);
    assert!(matches!(
        Epub::from_reader(Cursor::new(bytes)),
        Err(Error::SpineMissing(_))
    ));
}

#[test]
fn test_not_a_zip() {
    let result = Epub::from_reader(Cursor::new(b"plain text".to_vec()));
    assert!(matches!(result, Err(Error::Zip(_))));
}

#[test]
fn test_empty_spine_without_navigation_is_fatal() {
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        ("OEBPS/content.opf", opf(&[], &[], None)),
    ]);
    let epub = open(bytes);
    assert!(matches!(epub.html(), Err(Error::NothingToAssemble)));
}

// ============================================================================
// Facade
// ============================================================================

#[test]
fn test_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.epub");
    std::fs::write(
        &path,
        three_chapters(&[Point("One", "ch1.html", vec![]), Point("Two", "ch2.html", vec![])]),
    )
    .unwrap();

    let epub = Epub::open(&path).unwrap();
    assert_eq!(epub.metadata().title, "Test Book");
    assert_eq!(epub.metadata().creators, vec!["Jane Doe"]);
    assert_eq!(epub.package().spine.len(), 3);

    let html = epub.html().unwrap();
    assert!(html.starts_with("<article xmlns=\"http://www.w3.org/1999/xhtml\""));
    assert!(html.contains("<template id=\"css\">\n<css>\n</css>\n  </template>\n"));
    assert!(html.ends_with("</section>\n</article>\n"));
}

#[test]
fn test_stylesheets_feed_the_style_model() {
    let bytes = zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        (
            "OEBPS/content.opf",
            opf(
                &[("css", "style.css", "text/css"), xhtml("ch1", "ch1.html")],
                &["ch1"],
                None,
            ),
        ),
        ("OEBPS/style.css", ".auto1 { font-style: italic; color: red }".to_string()),
        ("OEBPS/ch1.html", page("<p class=\"auto1\">alpha</p>")),
    ]);
    let html = open(bytes).html().unwrap();

    assert!(html.contains(
        "<rule selector=\".auto1\">\n    <declaration property=\"font-style\" value=\"italic\"/>\n  </rule>"
    ));
    assert!(!html.contains("color"));
}
