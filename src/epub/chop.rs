//! Extraction of the markup between two navigation points.
//!
//! A navigation point addresses a file and, optionally, an anchor inside it.
//! The section it opens runs until the next navigation point: to the end of
//! the body when the next point is in another file, or to the line holding
//! the next anchor when it is in the same file. Boundaries are found on
//! lines, after forcing line breaks around block tags, so a cut never falls
//! inside a tag and text between two headings stays with the first one. The
//! repaired fragment is well-formed whatever the cut went through.

use std::sync::LazyLock;

use memchr::memmem;
use regex_lite::Regex;

use crate::archive::Archive;
use crate::diagnostics::{Diagnostics, comments};
use crate::epub::navigation::FileRef;
use crate::repair::{HtmlRepair, RepairOptions, TIDY};
use crate::util::decode_xml;

/// Closing tags of blocks that get a line of their own.
static BLOCK_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:div|p|h[1-6])\s*>").unwrap());

/// Opening tags of the same blocks, which start a line.
static BLOCK_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:div|p|h[1-6])\b").unwrap());

static BODY_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body[^>]*>").unwrap());

static BODY_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body\b").unwrap());

static BODY_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body\s*>").unwrap());

/// Placeholder for the ampersand of entities that must stay escaped.
const PROTECT: char = '\u{E000}';

const PROTECTED_ENTITIES: &[&str] = &["amp;", "lt;", "gt;", "quot;"];

/// A repaired fragment and the warnings raised while cutting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChopResult {
    pub html: String,
    pub warnings: Vec<String>,
}

impl ChopResult {
    /// Warnings as comments followed by the fragment, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = comments(&self.warnings);
        out.push_str(&self.html);
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

/// Cuts sections out of the files of one archive.
pub struct Chopper<'a> {
    archive: &'a dyn Archive,
    repair: &'a dyn HtmlRepair,
    options: RepairOptions,
}

impl<'a> Chopper<'a> {
    pub fn new(archive: &'a dyn Archive, repair: &'a dyn HtmlRepair) -> Self {
        Self {
            archive,
            repair,
            options: TIDY,
        }
    }

    pub fn with_options(mut self, options: RepairOptions) -> Self {
        self.options = options;
        self
    }

    /// Extract the section starting at `from` and ending before `to`.
    ///
    /// Never fails: an unreadable file, a missing `<body>` or a missing
    /// anchor yield a best-effort slice and a warning.
    pub fn chop(&self, from: &FileRef, to: Option<&FileRef>) -> ChopResult {
        let mut diagnostics = Diagnostics::new();

        let Some(bytes) = self.archive.get(&from.file) else {
            diagnostics.warn(format!("{}: file not found in archive", from.file));
            return ChopResult {
                html: String::new(),
                warnings: diagnostics.into_messages(),
            };
        };
        let contents = break_blocks(&decode_xml(bytes));

        let body_start = match BODY_OPEN_RE.find(&contents) {
            Some(m) => m.end(),
            None => {
                diagnostics.warn(format!("{}: no <body> tag, reading from file start", from.file));
                0
            }
        };

        let mut start = body_start;
        if let Some(anchor) = &from.anchor {
            match find_anchor(&contents, anchor) {
                Some((line_start, _)) => start = line_start.max(body_start),
                None => diagnostics.warn(format!(
                    "{}: anchor #{anchor} not found, section starts at <body>",
                    from.file
                )),
            }
        }

        let mut end = BODY_CLOSE_RE
            .find(&contents)
            .map_or(contents.len(), |m| m.start());

        if let Some(to) = to.filter(|to| to.file == from.file) {
            match &to.anchor {
                None => diagnostics.warn(format!(
                    "{}: next section {to} has no anchor, text may be repeated",
                    from.file
                )),
                Some(anchor) => match find_anchor(&contents, anchor) {
                    None => diagnostics.warn(format!(
                        "{}: end anchor #{anchor} not found, text may be repeated",
                        from.file
                    )),
                    Some((_, position)) if position < start => {
                        diagnostics.warn(format!(
                            "{}: end anchor #{anchor} precedes the start of {from}, section left empty",
                            from.file
                        ));
                        end = start;
                    }
                    Some((line_start, _)) => end = line_start,
                },
            }
        }
        let end = end.max(start);

        let slice = &contents[start..end];
        let html = if slice.trim().is_empty() {
            String::new()
        } else {
            self.repair.repair(&decode_entities(slice), &self.options)
        };

        ChopResult {
            html,
            warnings: diagnostics.into_messages(),
        }
    }
}

/// Convenience wrapper using the default repair settings.
pub fn chop(
    from: &FileRef,
    to: Option<&FileRef>,
    archive: &dyn Archive,
    repair: &dyn HtmlRepair,
) -> ChopResult {
    Chopper::new(archive, repair).chop(from, to)
}

/// Put block tags on lines of their own, and `<body` at the start of one.
fn break_blocks(contents: &str) -> String {
    let mut closed = String::with_capacity(contents.len() + contents.len() / 32);
    let mut last = 0;
    for m in BLOCK_CLOSE_RE.find_iter(contents) {
        closed.push_str(&contents[last..m.end()]);
        if !contents[m.end()..].starts_with('\n') {
            closed.push('\n');
        }
        last = m.end();
    }
    closed.push_str(&contents[last..]);

    let mut out = String::with_capacity(closed.len() + closed.len() / 32);
    let mut last = 0;
    let mut starts: Vec<usize> = BLOCK_OPEN_RE
        .find_iter(&closed)
        .chain(BODY_START_RE.find(&closed))
        .map(|m| m.start())
        .collect();
    starts.sort_unstable();
    for start in starts {
        out.push_str(&closed[last..start]);
        if start > 0 && !closed[..start].ends_with('\n') {
            out.push('\n');
        }
        last = start;
    }
    out.push_str(&closed[last..]);
    out
}

/// Locate `id="anchor"`: returns the offset of the line break opening its
/// line (0 on the first line) and the offset of the attribute itself.
fn find_anchor(contents: &str, anchor: &str) -> Option<(usize, usize)> {
    let needles = [format!("id=\"{anchor}\""), format!("id='{anchor}'")];
    let position = needles.iter().find_map(|needle| {
        memmem::find_iter(contents.as_bytes(), needle.as_bytes()).find(|&p| {
            // Reject `data-id="…"` and the like; keep `id` and `xml:id`
            p == 0 || matches!(contents.as_bytes()[p - 1], b' ' | b'\t' | b'\n' | b'\r' | b':')
        })
    })?;
    let line_start = memchr::memrchr(b'\n', &contents.as_bytes()[..position]).unwrap_or(0);
    Some((line_start, position))
}

/// Decode every character reference except the XML-significant ones.
fn decode_entities(fragment: &str) -> String {
    if !fragment.contains('&') {
        return fragment.to_string();
    }

    let mut protected = fragment.to_string();
    for entity in PROTECTED_ENTITIES {
        protected = protected.replace(&format!("&{entity}"), &format!("{PROTECT}{entity}"));
    }
    let mut decoded = html_escape::decode_html_entities(&protected).into_owned();
    for entity in PROTECTED_ENTITIES {
        decoded = decoded.replace(&format!("{PROTECT}{entity}"), &format!("&{entity}"));
    }
    decoded
}
