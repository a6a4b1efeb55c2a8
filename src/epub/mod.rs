//! EPUB to sectioned XHTML.
//!
//! An EPUB carries two orderings of its content: the spine (reading order
//! of files) and the navigation tree (NCX or EPUB 3 nav, pointing at files
//! and anchors). [`Epub`] resolves the package, walks the navigation tree,
//! cuts each section out of its file, and fills in whatever the navigation
//! skipped from the spine.
//!
//! ```no_run
//! use folio::Epub;
//!
//! let epub = Epub::open("book.epub")?;
//! println!("{}", epub.html()?);
//! for warning in epub.warnings() {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), folio::Error>(())
//! ```

pub mod assemble;
pub mod chop;
pub mod navigation;
pub mod package;

use std::borrow::Cow;
use std::cell::OnceCell;
use std::io::{Read, Seek};
use std::path::Path;

use crate::archive::{Archive, ZipArchiveReader};
use crate::css::{SemanticCss, StyleModel};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::repair::{Html5everRepair, HtmlRepair, RepairOptions};
use crate::rewrite::Rewrites;
use crate::transform::{XmlTransform, insert_first_child, stylesheets};
use crate::util::decode_text;

pub use assemble::{AssemblerState, Assembly, SectionAssembler};
pub use chop::{ChopResult, Chopper};
pub use navigation::{FileRef, NavNode};
pub use package::{Manifest, ManifestEntry, Metadata, Package, SpineItem};

const CSS_MEDIA_TYPE: &str = "text/css";

/// Namespaces declared on the `<article>` wrapper.
const ARTICLE_OPEN: &str = "<article xmlns=\"http://www.w3.org/1999/xhtml\" \
                            xmlns:epub=\"http://www.idpf.org/2007/ops\">\n";

/// Assembly settings.
#[derive(Debug, Clone)]
pub struct EpubOptions {
    /// Spine files skipped when they precede the first section, compared on
    /// the lowercase alphanumeric stem of the filename.
    pub boilerplate: Vec<String>,
    /// `class` token of emitted section markers.
    pub section_class: String,
    pub repair: RepairOptions,
    /// Cleanup run over the assembled sections before they are wrapped.
    pub rewrites: Rewrites,
}

impl Default for EpubOptions {
    fn default() -> Self {
        Self {
            boilerplate: ["cover", "titlepage", "colophon", "toc", "nav"]
                .into_iter()
                .map(String::from)
                .collect(),
            section_class: "ncx".to_string(),
            repair: RepairOptions::tidy(),
            rewrites: Rewrites::default(),
        }
    }
}

impl EpubOptions {
    /// Whether `filename` names a boilerplate page (`cover.xhtml`,
    /// `Title_Page.html`, `toc01.xhtml`...).
    pub fn is_boilerplate(&self, filename: &str) -> bool {
        let stem = boilerplate_stem(filename);
        if stem.is_empty() {
            return false;
        }
        self.boilerplate
            .iter()
            .any(|name| boilerplate_stem(name) == stem)
    }
}

fn boilerplate_stem(filename: &str) -> String {
    let name = crate::util::file_name(filename);
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    let stem: String = stem
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    stem.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
}

/// An opened EPUB.
pub struct Epub {
    archive: Box<dyn Archive>,
    package: Package,
    options: EpubOptions,
    repair: Box<dyn HtmlRepair>,
    style: Box<dyn StyleModel>,
    diagnostics: Diagnostics,
    assembly: OnceCell<Assembly>,
}

impl Epub {
    /// Open an EPUB file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening EPUB");
        Self::from_archive(Box::new(ZipArchiveReader::open(path)?))
    }

    /// Read an EPUB from any [`Read`] + [`Seek`] source.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_archive(Box::new(ZipArchiveReader::from_reader(reader)?))
    }

    /// Resolve the package of an already opened archive.
    pub fn from_archive(archive: Box<dyn Archive>) -> Result<Self> {
        let package = package::resolve(archive.as_ref())?;
        let mut epub = Self {
            archive,
            package,
            options: EpubOptions::default(),
            repair: Box::new(Html5everRepair::new()),
            style: Box::new(SemanticCss::new()),
            diagnostics: Diagnostics::new(),
            assembly: OnceCell::new(),
        };
        epub.load_styles();
        Ok(epub)
    }

    pub fn with_options(mut self, options: EpubOptions) -> Self {
        self.options = options;
        self.assembly = OnceCell::new();
        self
    }

    /// Replace the html5ever repair step.
    pub fn with_repair(mut self, repair: Box<dyn HtmlRepair>) -> Self {
        self.repair = repair;
        self.assembly = OnceCell::new();
        self
    }

    /// Replace the style model; every stylesheet is fed to it again.
    pub fn with_style_model(mut self, style: Box<dyn StyleModel>) -> Self {
        self.style = style;
        self.load_styles();
        self
    }

    fn load_styles(&mut self) {
        let hrefs: Vec<String> = self
            .package
            .manifest
            .by_media_type(CSS_MEDIA_TYPE)
            .map(|entry| entry.href.clone())
            .collect();
        for href in hrefs {
            match self.archive.get(&href) {
                Some(bytes) => {
                    self.style.parse(&decode_text(bytes, None));
                    tracing::debug!("load css {href}");
                }
                None => self
                    .diagnostics
                    .warn(format!("{href}: stylesheet not found in archive")),
            }
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn metadata(&self) -> &Metadata {
        &self.package.metadata
    }

    pub fn archive(&self) -> &dyn Archive {
        self.archive.as_ref()
    }

    /// The navigation tree, if the book has a usable one.
    pub fn navigation(&self) -> Result<NavNode> {
        navigation::build(self.archive.as_ref(), &self.package)
    }

    /// Assemble sections; computed once.
    ///
    /// A missing or unparsable navigation document degrades to the reading
    /// order, gap-filled file by file.
    pub fn sections(&self) -> Result<&Assembly> {
        if let Some(assembly) = self.assembly.get() {
            return Ok(assembly);
        }
        let assembler = SectionAssembler::new(
            self.archive.as_ref(),
            self.repair.as_ref(),
            &self.package.spine,
            &self.options,
        );
        let assembly = match self.navigation() {
            Ok(root) => assembler.assemble(&root)?,
            Err(e) => assembler.linear(&format!("{e}, reading order used instead"))?,
        };
        Ok(self.assembly.get_or_init(|| assembly))
    }

    /// Sections wrapped in an `<article>` pseudo-document, with the style
    /// model in a leading `<template id="css">`. The option rewrites run
    /// over the sections first.
    pub fn html(&self) -> Result<String> {
        let sections = self.sections()?;
        let body = if self.options.rewrites.is_empty() {
            Cow::Borrowed(sections.html.as_str())
        } else {
            Cow::Owned(self.options.rewrites.apply(&sections.html))
        };
        let mut html = String::with_capacity(body.len() + 256);
        html.push_str(ARTICLE_OPEN);
        html.push_str("  <template id=\"css\">\n");
        html.push_str(&self.style.as_xml());
        html.push_str("  </template>\n");
        html.push_str(&body);
        html.push_str("</article>\n");
        Ok(html)
    }

    /// TEI document: the article through [`stylesheets::HTML_TEI`], with a
    /// `<teiHeader>` built from the package metadata inserted first.
    pub fn tei(&self, transform: &dyn XmlTransform) -> Result<String> {
        let header = transform.transform(stylesheets::EPUB_DC_TEI, &self.package.metadata_xml, &[])?;
        let tei = transform.transform(stylesheets::HTML_TEI, &self.html()?, &[])?;
        Ok(insert_first_child(&tei, &header).unwrap_or(tei))
    }

    /// Load warnings followed by assembly warnings, once assembled.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.diagnostics.messages().to_vec();
        if let Some(assembly) = self.assembly.get() {
            warnings.extend(assembly.warnings.iter().cloned());
        }
        warnings
    }
}
