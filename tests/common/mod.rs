//! Fixture builders: EPUB and DOCX archives written in memory.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Write `entries` into a ZIP, `mimetype` first and stored.
pub fn zip(entries: &[(&str, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    for (name, content) in entries {
        zip.start_file(*name, deflated).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// XHTML chapter with the given body.
pub fn page(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
         <head><title>t</title></head>\n\
         <body>\n{body}\n</body>\n</html>\n"
    )
}

/// Package document. `items` are `(id, href, media-type)`, `spine` idrefs.
pub fn opf(items: &[(&str, &str, &str)], spine: &[&str], toc: Option<&str>) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"2.0\" unique-identifier=\"id\">\n\
         <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n\
         <dc:title>Test Book</dc:title>\n\
         <dc:creator>Jane Doe</dc:creator>\n\
         <dc:language>en</dc:language>\n\
         <dc:identifier id=\"id\">urn:uuid:1234</dc:identifier>\n\
         </metadata>\n<manifest>\n",
    );
    for (id, href, media_type) in items {
        let properties = if *id == "nav" { " properties=\"nav\"" } else { "" };
        xml.push_str(&format!(
            "<item id=\"{id}\" href=\"{href}\" media-type=\"{media_type}\"{properties}/>\n"
        ));
    }
    xml.push_str("</manifest>\n");
    match toc {
        Some(toc) => xml.push_str(&format!("<spine toc=\"{toc}\">\n")),
        None => xml.push_str("<spine>\n"),
    }
    for idref in spine {
        xml.push_str(&format!("<itemref idref=\"{idref}\"/>\n"));
    }
    xml.push_str("</spine>\n</package>\n");
    xml
}

/// A navigation point: label, `content/@src`, children.
pub struct Point(pub &'static str, pub &'static str, pub Vec<Point>);

/// NCX document holding `points` in its navMap.
pub fn ncx(points: &[Point]) -> String {
    fn write(points: &[Point], xml: &mut String, counter: &mut usize) {
        for Point(label, src, children) in points {
            *counter += 1;
            xml.push_str(&format!(
                "<navPoint id=\"p{counter}\" playOrder=\"{counter}\">\
                 <navLabel><text>{label}</text></navLabel>"
            ));
            if !src.is_empty() {
                xml.push_str(&format!("<content src=\"{src}\"/>"));
            }
            write(children, xml, counter);
            xml.push_str("</navPoint>\n");
        }
    }

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n\
         <head/><docTitle><text>Test Book</text></docTitle>\n<navMap>\n",
    );
    write(points, &mut xml, &mut 0);
    xml.push_str("</navMap>\n</ncx>\n");
    xml
}

pub fn xhtml(id: &'static str, href: &'static str) -> (&'static str, &'static str, &'static str) {
    (id, href, "application/xhtml+xml")
}

pub fn ncx_item() -> (&'static str, &'static str, &'static str) {
    ("ncx", "toc.ncx", "application/x-dtbncx+xml")
}

/// Three chapters `ch1`..`ch3` reading "alpha", "bravo", "charlie", with an
/// NCX made of `points`.
pub fn three_chapters(points: &[Point]) -> Vec<u8> {
    zip(&[
        ("META-INF/container.xml", CONTAINER.to_string()),
        (
            "OEBPS/content.opf",
            opf(
                &[
                    ncx_item(),
                    xhtml("ch1", "ch1.html"),
                    xhtml("ch2", "ch2.html"),
                    xhtml("ch3", "ch3.html"),
                ],
                &["ch1", "ch2", "ch3"],
                Some("ncx"),
            ),
        ),
        ("OEBPS/toc.ncx", ncx(points)),
        ("OEBPS/ch1.html", page("<p id=\"x\">alpha</p>")),
        ("OEBPS/ch2.html", page("<p>bravo</p>")),
        ("OEBPS/ch3.html", page("<p id=\"y\">charlie</p>")),
    ])
}
