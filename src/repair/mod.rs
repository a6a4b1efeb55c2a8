//! HTML repair: turn an arbitrary slice of a chapter into well-formed XHTML.
//!
//! Chopping a file at anchor lines cuts straight through elements, so the
//! fragment handed to [`HtmlRepair::repair`] is routinely unbalanced. The
//! shipped implementation parses it with html5ever (which recovers the way
//! browsers do) into a [`Dom`] and serializes the body back as XHTML.

mod dom;
mod serialize;
mod sink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

pub use dom::{Dom, NodeData, NodeId};
pub use sink::DomSink;

/// How a fragment is repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOptions {
    /// Unwrap elements that are not part of (X)HTML, keeping their content.
    pub strip_unknown_tags: bool,
    /// Do not emit a doctype.
    pub omit_doctype: bool,
    /// Self-close empty elements and declare the XHTML namespace.
    pub output_xhtml: bool,
    /// Return only the children of `<body>`.
    pub body_only: bool,
}

impl RepairOptions {
    /// Settings used for chopped chapter fragments.
    pub const fn tidy() -> Self {
        Self {
            strip_unknown_tags: true,
            omit_doctype: true,
            output_xhtml: true,
            body_only: true,
        }
    }
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self::tidy()
    }
}

/// Process-wide repair settings for chopped fragments.
pub static TIDY: RepairOptions = RepairOptions::tidy();

/// Makes a markup fragment well-formed.
pub trait HtmlRepair {
    fn repair(&self, fragment: &str, options: &RepairOptions) -> String;
}

impl<F> HtmlRepair for F
where
    F: Fn(&str, &RepairOptions) -> String,
{
    fn repair(&self, fragment: &str, options: &RepairOptions) -> String {
        self(fragment, options)
    }
}

/// [`HtmlRepair`] backed by the html5ever tree builder.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html5everRepair;

impl Html5everRepair {
    pub fn new() -> Self {
        Self
    }

    /// Parse a fragment into a [`Dom`].
    pub fn parse(&self, fragment: &str) -> Dom {
        let sink = parse_document(DomSink::new(), ParseOpts::default())
            .from_utf8()
            .one(fragment.as_bytes());
        if sink.error_count() > 0 {
            tracing::trace!(errors = sink.error_count(), "recovered from malformed markup");
        }
        sink.into_dom()
    }
}

impl HtmlRepair for Html5everRepair {
    fn repair(&self, fragment: &str, options: &RepairOptions) -> String {
        let dom = self.parse(fragment);
        serialize::serialize(&dom, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tidy(fragment: &str) -> String {
        Html5everRepair.repair(fragment, &TIDY)
    }

    #[test]
    fn test_balanced_fragment_is_unchanged() {
        assert_eq!(tidy("<p class=\"x\">Hello</p>"), "<p class=\"x\">Hello</p>");
    }

    #[test]
    fn test_unclosed_elements_are_closed() {
        assert_eq!(tidy("<div><p>One<p>Two"), "<div><p>One</p><p>Two</p></div>");
    }

    #[test]
    fn test_stray_closing_tags_are_dropped() {
        assert_eq!(tidy("text</p></div>\n<p>next</p>"), "text<p></p>\n<p>next</p>");
    }

    #[test]
    fn test_void_elements_self_close() {
        assert_eq!(
            tidy("<p>a<br>b<img src=\"i.png\" alt=\"\"></p>"),
            "<p>a<br />b<img src=\"i.png\" alt=\"\" /></p>"
        );
    }

    #[test]
    fn test_unknown_tags_are_unwrapped() {
        assert_eq!(tidy("<p><o:p>kept</o:p> text</p>"), "<p>kept text</p>");
        assert_eq!(tidy("<blink>on</blink>"), "on");
    }

    #[test]
    fn test_unknown_tags_kept_when_not_stripping() {
        let options = RepairOptions {
            strip_unknown_tags: false,
            ..RepairOptions::tidy()
        };
        assert_eq!(Html5everRepair.repair("<blink>on</blink>", &options), "<blink>on</blink>");
    }

    #[test]
    fn test_scripts_are_dropped() {
        assert_eq!(tidy("<p>a</p><script>alert(1)</script>"), "<p>a</p>");
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(tidy("<p>1 &lt; 2 &amp; 3</p>"), "<p>1 &lt; 2 &amp; 3</p>");
        assert_eq!(tidy("<p>AT&T</p>"), "<p>AT&amp;T</p>");
        assert_eq!(
            tidy("<a title=\"&quot;q&quot; &amp; r\">x</a>"),
            "<a title=\"&quot;q&quot; &amp; r\">x</a>"
        );
    }

    #[test]
    fn test_unbound_attribute_prefixes_are_dropped() {
        assert_eq!(
            tidy("<span epub:type=\"noteref\" o:lang=\"x\">1</span>"),
            "<span epub:type=\"noteref\">1</span>"
        );
    }

    #[test]
    fn test_svg_keeps_namespace() {
        assert_eq!(
            tidy("<svg><image xlink:href=\"c.jpg\"></image></svg>"),
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\"><image xlink:href=\"c.jpg\" /></svg>"
        );
    }

    #[test]
    fn test_comments_are_sanitized() {
        assert_eq!(tidy("<p>x</p><!-- a -- b -->"), "<p>x</p><!-- a - - b -->");
    }

    #[test]
    fn test_full_document_output() {
        let options = RepairOptions {
            body_only: false,
            omit_doctype: false,
            ..RepairOptions::tidy()
        };
        let out = Html5everRepair.repair("<p>x</p>", &options);
        assert!(out.starts_with("<!DOCTYPE html PUBLIC"));
        assert!(out.contains("<html xmlns=\"http://www.w3.org/1999/xhtml\"><head></head><body><p>x</p></body></html>"));
    }

    #[test]
    fn test_closure_repair() {
        let upper = |fragment: &str, _: &RepairOptions| fragment.to_uppercase();
        assert_eq!(upper.repair("<p>x</p>", &TIDY), "<P>X</P>");
    }
}
