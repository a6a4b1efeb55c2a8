//! Markdown to sectioned XHTML.
//!
//! CommonMark (with tables, footnotes and strikethrough) is rendered by
//! pulldown-cmark, which produces flat HTML. Heading levels are then turned
//! back into nested `<section>`s so the result has the same shape as an
//! assembled EPUB.

use std::convert::Infallible;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};
use regex_lite::{Captures, Regex};

use crate::error::Result;
use crate::transform::{XmlTransform, stylesheets};
use crate::util::decode_text;

static HIERARCHY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<h(\d)|(<[a-z]+ [^>]*(?:class|id)="footnotes"[^>]*>)"#).unwrap()
});

/// A Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markdown {
    source: String,
}

impl FromStr for Markdown {
    type Err = Infallible;

    fn from_str(source: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(source))
    }
}

impl Markdown {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Read a Markdown file; non UTF-8 input is decoded with detection.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), bytes = bytes.len(), "markdown loaded");
        Ok(Self::new(decode_text(&bytes, None)))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// `<article>` with one `<section>` per heading, nested by level.
    pub fn html(&self) -> String {
        let mut html = String::from("<article xmlns=\"http://www.w3.org/1999/xhtml\">\n  <section>\n");
        let (body, open) = sectionize(&render(&self.source));
        html.push_str(&body);
        html.push_str("  </section>\n");
        for _ in 1..open {
            html.push_str("  </section>\n");
        }
        html.push_str("</article>\n");
        html
    }

    pub fn tei(&self, transform: &dyn XmlTransform) -> Result<String> {
        transform.transform(stylesheets::HTML_TEI, &self.html(), &[])
    }
}

/// Flat HTML, footnote definitions gathered in a trailing
/// `<div class="footnotes">`.
fn render(source: &str) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
    let mut body = Vec::new();
    let mut notes = Vec::new();
    let mut depth = 0usize;

    for event in Parser::new_ext(source, options) {
        if matches!(event, Event::Start(Tag::FootnoteDefinition(_))) {
            depth += 1;
        }
        let in_note = depth > 0;
        if matches!(event, Event::End(TagEnd::FootnoteDefinition)) {
            depth = depth.saturating_sub(1);
        }
        if in_note {
            notes.push(event);
        } else {
            body.push(event);
        }
    }

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, body.into_iter());
    if !notes.is_empty() {
        out.push_str("<div class=\"footnotes\">\n");
        html::push_html(&mut out, notes.into_iter());
        out.push_str("</div>\n");
    }
    out
}

/// Open a `<section>` before every heading but the first, closing as many
/// as the level requires; the footnotes block closes everything and opens
/// `<section class="footnotes">`.
///
/// Returns the rewritten HTML and the number of sections left open,
/// counting the one the caller wraps around it.
fn sectionize(html: &str) -> (String, usize) {
    let mut last: Option<usize> = None;
    let body = HIERARCHY_RE.replace_all(html, |caps: &Captures<'_>| {
        let matched = &caps[0];
        let Some(open) = last else {
            last = Some(1);
            return matched.to_string();
        };

        let mut out = String::new();
        if caps.get(2).is_some() {
            out.push_str(&"</section>\n".repeat(open));
            out.push_str("<section class=\"footnotes\">\n");
            out.push_str(matched);
            last = Some(1);
            return out;
        }

        let level: usize = caps[1].parse().unwrap_or(1);
        out.push_str(&"</section>\n".repeat((open + 1).saturating_sub(level)));
        out.push_str("<section>\n");
        out.push_str(matched);
        last = Some(if level > open { open + 1 } else { level });
        out
    });
    (body.into_owned(), last.unwrap_or(1))
}
