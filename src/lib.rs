//! # folio
//!
//! Convert packaged documents (EPUB, DOCX, Markdown) into sectioned XHTML,
//! ready for an XSLT pass to TEI.
//!
//! ## EPUB
//!
//! The EPUB reader rebuilds the document structure from the navigation tree
//! (NCX, or the EPUB 3 navigation document), cutting each section out of
//! its file between anchors, and falls back on the spine for whatever the
//! navigation skips. Anomalies never stop a conversion: they are returned
//! as warnings and written as comments into the output.
//!
//! ```no_run
//! use folio::Epub;
//!
//! let epub = Epub::open("book.epub")?;
//! let html = epub.html()?;
//! std::fs::write("book.html", html)?;
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! ## Markdown and DOCX
//!
//! ```no_run
//! use folio::{Docx, Markdown};
//!
//! let article = Markdown::open("notes.md")?.html();
//! let package = Docx::open("paper.docx")?.package()?;
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! The TEI step needs an XSLT engine, injected through [`XmlTransform`].

pub mod archive;
pub mod css;
pub mod diagnostics;
pub mod docx;
pub mod epub;
pub mod error;
pub mod markdown;
pub mod repair;
pub mod rewrite;
pub mod transform;
pub(crate) mod util;

pub use archive::{Archive, MemoryArchive, ZipArchiveReader};
pub use css::{SemanticCss, StyleModel};
pub use docx::Docx;
pub use epub::{Epub, EpubOptions, FileRef, Metadata, NavNode};
pub use error::{Error, Result};
pub use markdown::Markdown;
pub use repair::{Html5everRepair, HtmlRepair, RepairOptions};
pub use rewrite::{Rewrite, Rewrites};
pub use transform::{NoTransform, XmlTransform};
