//! Navigation tree: NCX `navMap`, or the EPUB 3 `<nav epub:type="toc">`.

use std::fmt;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::archive::Archive;
use crate::epub::package::{ManifestEntry, Package};
use crate::error::{Error, Result};
use crate::util::{
    attribute, collapse_whitespace, decode_xml, local_name, parent_dir, percent_decode,
    resolve_entity, resolve_href,
};

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// A file in the archive, optionally narrowed to an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    /// Archive path.
    pub file: String,
    pub anchor: Option<String>,
}

impl FileRef {
    pub fn new(file: impl Into<String>, anchor: Option<&str>) -> Self {
        Self {
            file: file.into(),
            anchor: anchor.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// Resolve an href found in the document at `doc_path`.
    ///
    /// The href is split on its first `#`; both parts are percent-decoded.
    /// A bare fragment points into the document itself.
    pub fn from_href(doc_path: &str, href: &str) -> Self {
        let (file, anchor) = match href.split_once('#') {
            Some((file, anchor)) => (file, Some(anchor)),
            None => (href, None),
        };
        let path = if file.is_empty() {
            doc_path.to_string()
        } else {
            resolve_href(&parent_dir(doc_path), file)
        };
        let anchor = anchor.map(percent_decode);
        Self::new(path, anchor.as_deref())
    }

    /// Last segment of the file path.
    pub fn filename(&self) -> &str {
        crate::util::file_name(&self.file)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.anchor {
            Some(anchor) => write!(f, "{}#{}", self.file, anchor),
            None => write!(f, "{}", self.file),
        }
    }
}

/// One entry of the navigation hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavNode {
    /// Label, possibly empty.
    pub title: String,
    pub content: Option<FileRef>,
    pub children: Vec<NavNode>,
    /// 0 for the synthetic root.
    pub depth: usize,
}

impl NavNode {
    /// The synthetic root holding top-level entries.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Number of content references in this subtree.
    pub fn content_count(&self) -> usize {
        usize::from(self.content.is_some())
            + self.children.iter().map(NavNode::content_count).sum::<usize>()
    }

    /// Content references in document order.
    pub fn content_refs(&self) -> Vec<&FileRef> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a FileRef>) {
        if let Some(content) = &self.content {
            refs.push(content);
        }
        for child in &self.children {
            child.collect_refs(refs);
        }
    }
}

/// Build the navigation tree of a resolved package.
///
/// The NCX named by the spine's `toc` attribute (or the first NCX in the
/// manifest) is preferred; an EPUB 3 navigation document is used otherwise.
pub fn build(archive: &dyn Archive, package: &Package) -> Result<NavNode> {
    if let Some(entry) = ncx_entry(package) {
        if let Some(bytes) = archive.get(&entry.href) {
            tracing::debug!(path = %entry.href, "reading NCX");
            return parse_ncx(&decode_xml(bytes), &entry.href);
        }
        tracing::warn!("NCX {} declared but absent from archive", entry.href);
    }

    if let Some(entry) = package.manifest.iter().find(|e| e.has_property("nav")) {
        if let Some(bytes) = archive.get(&entry.href) {
            tracing::debug!(path = %entry.href, "reading EPUB 3 navigation document");
            return parse_nav(&decode_xml(bytes), &entry.href);
        }
        tracing::warn!("navigation document {} absent from archive", entry.href);
    }

    Err(Error::NavigationNotFound(package.path.clone()))
}

fn ncx_entry(package: &Package) -> Option<&ManifestEntry> {
    package
        .toc_id
        .as_deref()
        .and_then(|id| package.manifest.get(id))
        .filter(|e| e.media_type.eq_ignore_ascii_case(NCX_MEDIA_TYPE))
        .or_else(|| package.manifest.by_media_type(NCX_MEDIA_TYPE).next())
}

/// Attach a finished node to the node below it on the stack.
fn attach(stack: &mut Vec<NavNode>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(mut node) = stack.pop() {
        node.title = collapse_whitespace(&node.title);
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }
}

/// Parse an NCX document located at `ncx_path`.
pub fn parse_ncx(content: &str, ncx_path: &str) -> Result<NavNode> {
    let mut reader = Reader::from_str(content);
    // Untrimmed: spaces around entity references are significant
    reader.config_mut().trim_text(false);

    let mut stack = vec![NavNode::root()];
    let mut in_nav_map = false;
    let mut in_label = false;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navMap" => in_nav_map = true,
                    b"navPoint" if in_nav_map => {
                        let depth = stack.len();
                        stack.push(NavNode {
                            depth,
                            ..NavNode::default()
                        });
                    }
                    b"navLabel" if stack.len() > 1 => in_label = true,
                    b"text" if in_label => in_text = true,
                    b"content" if stack.len() > 1 => set_ncx_content(&mut stack, &e, ncx_path),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content" && stack.len() > 1 {
                    set_ncx_content(&mut stack, &e, ncx_path);
                }
            }
            Event::Text(e) => {
                if in_text && let Some(node) = stack.last_mut() {
                    node.title.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if in_text && let Some(node) = stack.last_mut() {
                    node.title.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text && let Some(node) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    match resolve_entity(&entity) {
                        Some(resolved) => node.title.push_str(&resolved),
                        None => node.title.push_str(&format!("&{entity};")),
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navMap" => in_nav_map = false,
                    b"navLabel" => in_label = false,
                    b"text" => in_text = false,
                    b"navPoint" if in_nav_map => attach(&mut stack),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unclosed navPoints in a truncated file
    while stack.len() > 1 {
        attach(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}

fn set_ncx_content(stack: &mut [NavNode], e: &quick_xml::events::BytesStart<'_>, ncx_path: &str) {
    if let Some(node) = stack.last_mut()
        && node.content.is_none()
        && let Some(src) = attribute(e, b"src")
        && !src.trim().is_empty()
    {
        node.content = Some(FileRef::from_href(ncx_path, src.trim()));
    }
}

/// Parse an EPUB 3 XHTML navigation document located at `nav_path`.
///
/// Reads the `<nav>` whose `epub:type` is `toc`, or the first `<nav>` when
/// none is typed.
pub fn parse_nav(content: &str, nav_path: &str) -> Result<NavNode> {
    let toc = parse_nav_element(content, nav_path, true)?;
    if toc.children.is_empty() {
        return parse_nav_element(content, nav_path, false);
    }
    Ok(toc)
}

fn parse_nav_element(content: &str, nav_path: &str, toc_only: bool) -> Result<NavNode> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut stack = vec![NavNode::root()];
    // Element depth inside the chosen <nav>; 0 when outside
    let mut nav_depth = 0usize;
    let mut done = false;
    // Element depth inside the current <a>/<span> label; 0 when outside
    let mut label_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if nav_depth == 0 {
                    if local == b"nav" && !done && (!toc_only || is_toc_nav(&e)) {
                        nav_depth = 1;
                    }
                    continue;
                }
                nav_depth += 1;

                if label_depth > 0 {
                    label_depth += 1;
                    continue;
                }
                match local {
                    b"li" => {
                        let depth = stack.len();
                        stack.push(NavNode {
                            depth,
                            ..NavNode::default()
                        });
                    }
                    b"a" | b"span" if stack.len() > 1 => {
                        if let Some(node) = stack.last_mut()
                            && node.title.is_empty()
                            && node.content.is_none()
                        {
                            if local == b"a"
                                && let Some(href) = attribute(&e, b"href")
                                && !href.trim().is_empty()
                            {
                                node.content = Some(FileRef::from_href(nav_path, href.trim()));
                            }
                            label_depth = 1;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if label_depth > 0 && let Some(node) = stack.last_mut() {
                    node.title.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if label_depth > 0 && let Some(node) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        node.title.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                if nav_depth == 0 {
                    continue;
                }
                nav_depth -= 1;
                if nav_depth == 0 {
                    done = true;
                    continue;
                }
                if label_depth > 0 {
                    label_depth -= 1;
                    continue;
                }
                let name = e.name();
                if local_name(name.as_ref()) == b"li" {
                    attach(&mut stack);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        if done {
            break;
        }
    }

    while stack.len() > 1 {
        attach(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}

fn is_toc_nav(e: &quick_xml::events::BytesStart<'_>) -> bool {
    attribute(e, b"type").is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "toc"))
}
