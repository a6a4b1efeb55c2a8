//! DOCX to flat OPC package, and on to TEI through stylesheets.
//!
//! WordprocessingML is spread over several parts of the ZIP. The stylesheets
//! want them in one document, so [`Docx::package`] concatenates the parts
//! they read into a `<pkg:package>` (the flat OPC format Word itself saves).

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::archive::{Archive, ZipArchiveReader};
use crate::error::{Error, Result};
use crate::rewrite::Rewrites;
use crate::transform::{XmlTransform, stylesheets};
use crate::util::decode_xml;

const DOCUMENT: &str = "word/document.xml";

const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// Parts copied into the package, with their content type.
const PARTS: &[(&str, &str)] = &[
    (
        "word/styles.xml",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
    ),
    (
        DOCUMENT,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
    ),
    ("word/_rels/document.xml.rels", RELATIONSHIPS),
    (
        "word/footnotes.xml",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml",
    ),
    ("word/_rels/footnotes.xml.rels", RELATIONSHIPS),
    (
        "word/endnotes.xml",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.endnotes+xml",
    ),
    ("word/_rels/endnotes.xml.rels", RELATIONSHIPS),
    (
        "word/numbering.xml",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml",
    ),
];

/// Default TEI template handed to [`stylesheets::DOCX_TEMPLATE`].
pub const DEFAULT_TEMPLATE: &str = "docx/default.xml";

static PROLOG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*<\?xml[^?>]*\?>\s*").unwrap());

/// An opened DOCX.
pub struct Docx {
    archive: Box<dyn Archive>,
    rewrites: Rewrites,
    template: String,
}

impl Docx {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening DOCX");
        Ok(Self::from_archive(Box::new(ZipArchiveReader::open(path)?)))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Ok(Self::from_archive(Box::new(ZipArchiveReader::from_reader(reader)?)))
    }

    pub fn from_archive(archive: Box<dyn Archive>) -> Self {
        Self {
            archive,
            rewrites: Rewrites::default(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Rewrites run between the paragraph and template stylesheets.
    pub fn with_rewrites(mut self, rewrites: Rewrites) -> Self {
        self.rewrites = rewrites;
        self
    }

    /// TEI template merged by the last stylesheet.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Flat OPC package of the parts the stylesheets read.
    pub fn package(&self) -> Result<String> {
        if !self.archive.contains(DOCUMENT) {
            return Err(Error::MissingElement(DOCUMENT.to_string()));
        }

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <pkg:package xmlns:pkg=\"http://schemas.microsoft.com/office/2006/xmlPackage\">\n",
        );
        for &(name, content_type) in PARTS {
            let Some(bytes) = self.archive.get(name) else {
                tracing::debug!("{name} not found in docx, skipped");
                continue;
            };
            let content = decode_xml(bytes);
            let content = PROLOG_RE.replace_all(&content, "");
            xml.push_str(&format!(
                "  <pkg:part pkg:contentType=\"{content_type}\" pkg:name=\"/{name}\">\n    <pkg:xmlData>\n{content}\n    </pkg:xmlData>\n  </pkg:part>\n"
            ));
        }
        xml.push_str("</pkg:package>\n");
        Ok(xml)
    }

    /// Package, then paragraphs, divisions, rewrites and template.
    pub fn tei(&self, transform: &dyn XmlTransform) -> Result<String> {
        let package = self.package()?;
        let teilike = transform.transform(stylesheets::DOCX_TEILIKE, &package, &[])?;
        let divs = transform.transform(stylesheets::DOCX_DIVS, &teilike, &[])?;
        let cleaned = self.rewrites.apply(&divs);
        transform.transform(
            stylesheets::DOCX_TEMPLATE,
            &cleaned,
            &[("template", self.template.as_str())],
        )
    }
}
