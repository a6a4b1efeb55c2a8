//! Archive access for packaged formats (EPUB, DOCX).
//!
//! A document is read start to finish from one archive, so the ZIP is
//! inflated once at open time and entries are served from memory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::error::Result;
use crate::util::{normalize_path, percent_decode};

/// Read-only access to the named entries of a container.
///
/// Names are `/`-separated archive paths. Lookups normalize the requested
/// name first and fall back to its percent-decoded form; a miss is `None`,
/// never an error.
pub trait Archive {
    /// Raw bytes of an entry.
    fn get(&self, name: &str) -> Option<&[u8]>;

    /// All entry names, in archive order.
    fn list(&self) -> Vec<String>;

    /// Whether an entry exists.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Entries held in memory, keyed by normalized name.
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    names: Vec<String>,
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry.
    pub fn insert(&mut self, name: impl AsRef<str>, data: impl Into<Vec<u8>>) {
        let key = normalize_path(name.as_ref());
        if !self.entries.contains_key(&key) {
            self.names.push(key.clone());
        }
        self.entries.insert(key, data.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Archive for MemoryArchive {
    fn get(&self, name: &str) -> Option<&[u8]> {
        let key = normalize_path(name);
        if let Some(data) = self.entries.get(&key) {
            return Some(data);
        }
        // Fallback: percent-decoded path (handles hrefs that were not decoded)
        let decoded = normalize_path(&percent_decode(name));
        self.entries.get(&decoded).map(Vec::as_slice)
    }

    fn list(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// A ZIP container, fully inflated into memory.
#[derive(Debug, Default)]
pub struct ZipArchiveReader {
    inner: MemoryArchive,
}

impl ZipArchiveReader {
    /// Open a ZIP file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Read a ZIP from any [`Read`] + [`Seek`] source.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut inner = MemoryArchive::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            inner.insert(name, data);
        }

        tracing::debug!(entries = inner.len(), "archive loaded");
        Ok(Self { inner })
    }
}

impl Archive for ZipArchiveReader {
    fn get(&self, name: &str) -> Option<&[u8]> {
        self.inner.get(name)
    }

    fn list(&self) -> Vec<String> {
        self.inner.list()
    }
}
