//! Error types for folio operations.

use thiserror::Error;

/// Errors that stop the conversion of one document.
///
/// Anything recoverable (missing anchors, files absent from the navigation,
/// unreadable chapters) is reported as a warning instead and never shows up
/// here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Package document not found: {0}")]
    PackageNotFound(String),

    #[error("Package document {0} has no <manifest>")]
    ManifestMissing(String),

    #[error("Package document {0} has no <spine>")]
    SpineMissing(String),

    #[error("No navigation document declared in {0}")]
    NavigationNotFound(String),

    #[error("Nothing to assemble: empty spine and no navigation")]
    NothingToAssemble,

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Transform {stylesheet} failed: {message}")]
    Transform { stylesheet: String, message: String },

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
