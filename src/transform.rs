//! Tree-to-tree transformation capability.
//!
//! The final HTML→TEI step is an XSLT pipeline. No stylesheet engine ships
//! with this crate: callers inject one (libxslt bindings, a saxon process,
//! or a closure for tests) through [`XmlTransform`].

use crate::error::{Error, Result};

/// Stylesheet names, relative to the caller's stylesheet pack.
pub mod stylesheets {
    /// Package metadata (Dublin Core) to `<teiHeader>`.
    pub const EPUB_DC_TEI: &str = "html_tei/epub_dc_tei.xsl";
    /// Sectioned XHTML article to TEI text.
    pub const HTML_TEI: &str = "html_tei/html_tei.xsl";
    /// Flat OPC WordprocessingML to TEI-like paragraphs.
    pub const DOCX_TEILIKE: &str = "docx/docx_teilike.xsl";
    /// Nest TEI-like paragraphs into `<div>`s from heading levels.
    pub const DOCX_DIVS: &str = "docx/divs.xsl";
    /// Merge the body into a TEI template document.
    pub const DOCX_TEMPLATE: &str = "docx/tei_tmpl.xsl";
}

/// Applies a named stylesheet to an XML document.
pub trait XmlTransform {
    fn transform(&self, stylesheet: &str, xml: &str, params: &[(&str, &str)]) -> Result<String>;
}

impl<F> XmlTransform for F
where
    F: Fn(&str, &str, &[(&str, &str)]) -> Result<String>,
{
    fn transform(&self, stylesheet: &str, xml: &str, params: &[(&str, &str)]) -> Result<String> {
        self(stylesheet, xml, params)
    }
}

/// Transform that always fails; the default when no engine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransform;

impl XmlTransform for NoTransform {
    fn transform(&self, stylesheet: &str, _xml: &str, _params: &[(&str, &str)]) -> Result<String> {
        Err(Error::Transform {
            stylesheet: stylesheet.to_string(),
            message: "no XSLT engine configured".to_string(),
        })
    }
}

/// Insert `child` as the first child element of the document element of
/// `xml`, after its start tag. Returns `None` when `xml` has no element.
pub fn insert_first_child(xml: &str, child: &str) -> Option<String> {
    let child = strip_prolog(child);
    let mut pos = 0;
    // Skip prolog, comments, processing instructions and doctype
    loop {
        let open = pos + xml[pos..].find('<')?;
        let rest = &xml[open..];
        if rest.starts_with("<?") {
            pos = open + rest.find("?>")? + 2;
        } else if rest.starts_with("<!--") {
            pos = open + rest.find("-->")? + 3;
        } else if rest.starts_with("<!") {
            pos = open + rest.find('>')? + 1;
        } else {
            let end = open + start_tag_end(rest)?;
            if xml[..end].ends_with("/>") {
                let name_end = rest[1..]
                    .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
                    .map(|i| i + 1)?;
                let name = &rest[1..name_end];
                return Some(format!(
                    "{}>{child}</{name}>{}",
                    xml[..end - 2].trim_end(),
                    &xml[end..]
                ));
            }
            return Some(format!("{}{child}{}", &xml[..end], &xml[end..]));
        }
    }
}

/// Byte offset just past the `>` closing the start tag at the beginning of
/// `tag`, skipping quoted attribute values.
fn start_tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Drop a leading XML declaration.
pub fn strip_prolog(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml")
        && let Some(end) = trimmed.find("?>")
    {
        return trimmed[end + 2..].trim_start();
    }
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_transform() {
        let upper = |stylesheet: &str, xml: &str, params: &[(&str, &str)]| -> Result<String> {
            Ok(format!("{stylesheet}:{}:{}", xml.to_uppercase(), params.len()))
        };
        assert_eq!(upper.transform("a.xsl", "<x/>", &[("k", "v")]).unwrap(), "a.xsl:<X/>:1");
    }

    #[test]
    fn test_no_transform_fails() {
        let err = NoTransform.transform("a.xsl", "<x/>", &[]).unwrap_err();
        assert!(matches!(err, Error::Transform { stylesheet, .. } if stylesheet == "a.xsl"));
    }

    #[test]
    fn test_insert_first_child() {
        assert_eq!(
            insert_first_child(
                "<?xml version=\"1.0\"?>\n<!-- c --><TEI a=\"x>y\">\n<text/></TEI>",
                "<?xml version=\"1.0\"?>\n<teiHeader/>"
            )
            .unwrap(),
            "<?xml version=\"1.0\"?>\n<!-- c --><TEI a=\"x>y\"><teiHeader/>\n<text/></TEI>"
        );
        assert_eq!(
            insert_first_child("<TEI xmlns=\"t\"/>", "<h/>").unwrap(),
            "<TEI xmlns=\"t\"><h/></TEI>"
        );
        assert_eq!(insert_first_child("no markup", "<h/>"), None);
    }

    #[test]
    fn test_strip_prolog() {
        assert_eq!(strip_prolog("<?xml version=\"1.0\"?>\n<a/>"), "<a/>");
        assert_eq!(strip_prolog("<a/>"), "<a/>");
    }
}
