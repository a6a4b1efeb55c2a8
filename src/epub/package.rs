//! Package resolution: `META-INF/container.xml` and the OPF package document.

use std::collections::{HashMap, HashSet};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::util::{
    attribute, collapse_whitespace, decode_xml, file_name, local_name, normalize_path, parent_dir,
    percent_decode, resolve_entity, resolve_href,
};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// One resource declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    /// Archive path, resolved against the package document's directory.
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestEntry {
    /// Whether the space-separated `properties` attribute holds `property`.
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
    }
}

/// Manifest entries in document order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    fn push(&mut self, entry: ManifestEntry) {
        if self.index.contains_key(&entry.id) {
            tracing::warn!("duplicate manifest id {}, first declaration kept", entry.id);
            return;
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn by_media_type<'a>(
        &'a self,
        media_type: &'a str,
    ) -> impl Iterator<Item = &'a ManifestEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.media_type.eq_ignore_ascii_case(media_type))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One entry of the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    /// Last segment of `path`; spine files are matched by this name.
    pub filename: String,
    /// Archive path.
    pub path: String,
}

/// Dublin Core metadata from the package document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub creators: Vec<String>,
    pub language: String,
    pub identifier: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub date: Option<String>,
    pub rights: Option<String>,
}

/// Resolved package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Archive path of the package document.
    pub path: String,
    /// Directory of the package document, with trailing slash ("" at root).
    pub dir: String,
    pub metadata: Metadata,
    /// The `<metadata>` element as a standalone XML document, namespace
    /// declarations of the package root included.
    pub metadata_xml: String,
    pub manifest: Manifest,
    pub spine: Vec<SpineItem>,
    /// Manifest id named by `<spine toc="...">`.
    pub toc_id: Option<String>,
}

/// Locate and parse the package document of an EPUB archive.
pub fn resolve(archive: &dyn Archive) -> Result<Package> {
    let path = rootfile_path(archive)?;
    let bytes = archive
        .get(&path)
        .ok_or_else(|| Error::PackageNotFound(path.clone()))?;
    let content = decode_xml(bytes);
    let package = parse_package(&path, &content)?;
    tracing::debug!(
        path = %package.path,
        manifest = package.manifest.len(),
        spine = package.spine.len(),
        "package resolved"
    );
    Ok(package)
}

/// Read `META-INF/container.xml` and return the package document path.
pub fn rootfile_path(archive: &dyn Archive) -> Result<String> {
    let bytes = archive
        .get(CONTAINER_PATH)
        .ok_or_else(|| Error::PackageNotFound(CONTAINER_PATH.to_string()))?;
    // seen in the wild: container.xml in UTF-16
    let content = decode_xml(bytes);
    parse_container(&content)
}

/// Parse container.xml content to find the first rootfile's full path.
pub fn parse_container(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(full_path) = attribute(&e, b"full-path")
                    && !full_path.trim().is_empty()
                {
                    return Ok(normalize_path(&percent_decode(full_path.trim())));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::PackageNotFound(format!(
        "{CONTAINER_PATH} declares no rootfile"
    )))
}

/// Parse an OPF package document located at `path`.
pub fn parse_package(path: &str, content: &str) -> Result<Package> {
    let dir = parent_dir(path);
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut package = Package {
        path: path.to_string(),
        dir: dir.clone(),
        ..Package::default()
    };
    let mut spine_ids: Vec<String> = Vec::new();
    let mut saw_manifest = false;
    let mut saw_spine = false;

    let mut root_namespaces: Vec<(String, String)> = Vec::new();
    let mut metadata_start: Option<usize> = None;
    let mut metadata_range: Option<(usize, usize)> = None;
    let mut current_element: Option<Vec<u8>> = None;
    let mut buf_text = String::new();

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"package" => root_namespaces = namespace_declarations(&e),
                    b"metadata" => metadata_start = Some(position),
                    b"manifest" => saw_manifest = true,
                    b"spine" => {
                        saw_spine = true;
                        package.toc_id = attribute(&e, b"toc");
                    }
                    b"item" => push_item(&mut package, &e),
                    b"itemref" => spine_ids.extend(attribute(&e, b"idref")),
                    b"title" | b"creator" | b"language" | b"identifier" | b"publisher"
                    | b"description" | b"subject" | b"date" | b"rights"
                        if metadata_start.is_some() && metadata_range.is_none() =>
                    {
                        current_element = Some(local.to_vec());
                        buf_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"manifest" => saw_manifest = true,
                    b"spine" => {
                        saw_spine = true;
                        package.toc_id = attribute(&e, b"toc");
                    }
                    b"item" => push_item(&mut package, &e),
                    b"itemref" => spine_ids.extend(attribute(&e, b"idref")),
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata"
                    && let Some(start) = metadata_start
                    && metadata_range.is_none()
                {
                    metadata_range = Some((start, reader.buffer_position() as usize));
                }

                if current_element.as_deref() == Some(local) {
                    let value = collapse_whitespace(&buf_text);
                    set_metadata(&mut package.metadata, local, value);
                    current_element = None;
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_manifest {
        return Err(Error::ManifestMissing(path.to_string()));
    }
    if !saw_spine {
        return Err(Error::SpineMissing(path.to_string()));
    }

    if let Some((start, end)) = metadata_range {
        package.metadata_xml = standalone_metadata(&content[start..end], &root_namespaces);
    }
    package.spine = build_spine(&package.manifest, &spine_ids);
    Ok(package)
}

fn push_item(package: &mut Package, e: &quick_xml::events::BytesStart<'_>) {
    let Some(id) = attribute(e, b"id").filter(|id| !id.is_empty()) else {
        return;
    };
    let href = attribute(e, b"href").unwrap_or_default();
    package.manifest.push(ManifestEntry {
        id,
        href: resolve_href(&package.dir, &href),
        media_type: attribute(e, b"media-type").unwrap_or_default(),
        properties: attribute(e, b"properties"),
    });
}

fn set_metadata(metadata: &mut Metadata, element: &[u8], value: String) {
    if value.is_empty() {
        return;
    }
    match element {
        b"title" if metadata.title.is_empty() => metadata.title = value,
        b"creator" => metadata.creators.push(value),
        b"language" if metadata.language.is_empty() => metadata.language = value,
        b"identifier" if metadata.identifier.is_empty() => metadata.identifier = value,
        b"publisher" => metadata.publisher = Some(value),
        b"description" => metadata.description = Some(value),
        b"subject" => metadata.subjects.push(value),
        b"date" if metadata.date.is_none() => metadata.date = Some(value),
        b"rights" => metadata.rights = Some(value),
        _ => {}
    }
}

/// Map spine idrefs to archive paths, keeping the first item per filename.
fn build_spine(manifest: &Manifest, idrefs: &[String]) -> Vec<SpineItem> {
    let mut seen = HashSet::new();
    let mut spine = Vec::with_capacity(idrefs.len());

    for idref in idrefs {
        let Some(entry) = manifest.get(idref) else {
            tracing::warn!("spine itemref {idref} not found in manifest, skipped");
            continue;
        };
        let filename = file_name(&entry.href).to_string();
        if !seen.insert(filename.clone()) {
            tracing::warn!("spine file {filename} listed twice, later occurrence skipped");
            continue;
        }
        spine.push(SpineItem {
            idref: idref.clone(),
            filename,
            path: entry.href.clone(),
        });
    }
    spine
}

/// `xmlns` declarations carried by an element, as `(attribute, value)` pairs.
fn namespace_declarations(e: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter(|attr| {
            let key = attr.key.as_ref();
            key == b"xmlns" || key.starts_with(b"xmlns:")
        })
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            )
        })
        .collect()
}

/// Copy the root's namespace declarations onto the metadata start tag.
fn standalone_metadata(raw: &str, namespaces: &[(String, String)]) -> String {
    let tag_end = raw.find('>').unwrap_or(raw.len());
    let start_tag = &raw[..tag_end];
    let name_end = start_tag
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(start_tag.len());

    let mut declarations = String::new();
    for (key, value) in namespaces {
        if !start_tag.contains(&format!("{key}=")) {
            declarations.push_str(&format!(" {key}=\"{value}\""));
        }
    }

    let mut xml = String::with_capacity(raw.len() + declarations.len());
    xml.push_str(&raw[..name_end]);
    xml.push_str(&declarations);
    xml.push_str(&raw[name_end..]);
    xml
}
