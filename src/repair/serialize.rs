//! XHTML serialization of a repaired DOM.

use html5ever::ns;

use super::RepairOptions;
use super::dom::{Dom, NodeData, NodeId};
use crate::diagnostics::{escape_text, sanitize_comment};

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements dropped together with their content.
const DROPPED_ELEMENTS: &[&str] = &["script", "noscript", "style", "template", "iframe", "object"];

/// HTML elements kept as they are; anything else is unwrapped when
/// unknown tags are stripped.
const KNOWN_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "article", "aside", "audio", "b", "bdi", "bdo",
    "big", "blockquote", "body", "br", "caption", "center", "cite", "code", "col", "colgroup",
    "dd", "del", "details", "dfn", "div", "dl", "dt", "em", "figcaption", "figure", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "i", "img", "ins", "kbd",
    "li", "main", "map", "mark", "nav", "ol", "p", "picture", "pre", "q", "rb", "rp", "rt", "ruby",
    "s", "samp", "section", "small", "source", "span", "strike", "strong", "sub", "summary", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul", "var", "video",
    "wbr",
];

const XHTML_DOCTYPE: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \
    \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n";

/// Serialize a parsed document according to `options`.
pub fn serialize(dom: &Dom, options: &RepairOptions) -> String {
    let mut out = String::new();

    if options.body_only {
        if let Some(body) = dom.find("body") {
            for &child in dom.children(body) {
                write_node(dom, child, options, &mut out);
            }
        }
        return out;
    }

    if !options.omit_doctype {
        out.push_str(XHTML_DOCTYPE);
    }
    for &child in dom.children(dom.document()) {
        write_node(dom, child, options, &mut out);
    }
    out
}

fn write_node(dom: &Dom, id: NodeId, options: &RepairOptions, out: &mut String) {
    match dom.data(id) {
        NodeData::Text(text) => out.push_str(&escape_text(text)),
        NodeData::Comment(text) => {
            if !text.is_empty() {
                out.push_str("<!--");
                out.push_str(&sanitize_comment(text));
                out.push_str("-->");
            }
        }
        NodeData::Element { name, attrs } => {
            let local = name.local.as_ref();
            let foreign = name.ns == ns!(svg) || name.ns == ns!(mathml);

            if !foreign && DROPPED_ELEMENTS.contains(&local) {
                return;
            }
            if options.strip_unknown_tags && !foreign && !KNOWN_ELEMENTS.contains(&local) {
                for &child in dom.children(id) {
                    write_node(dom, child, options, out);
                }
                return;
            }

            out.push('<');
            out.push_str(local);

            // Foreign roots declare their namespace; the html root declares XHTML
            let parent_ns = dom.parent(id).and_then(|parent| dom.name(parent)).map(|n| &n.ns);
            if (foreign && parent_ns != Some(&name.ns)) || (local == "html" && options.output_xhtml) {
                out.push_str(" xmlns=\"");
                out.push_str(&name.ns);
                out.push('"');
                if local == "svg" {
                    out.push_str(" xmlns:xlink=\"http://www.w3.org/1999/xlink\"");
                }
            }
            for attr in attrs {
                let Some(attr_name) = attribute_name(attr.name.prefix.as_deref(), &attr.name.local)
                else {
                    continue;
                };
                out.push(' ');
                out.push_str(&attr_name);
                out.push_str("=\"");
                out.push_str(&escape_attr_value(&attr.value));
                out.push('"');
            }

            if dom.children(id).is_empty() && (VOID_ELEMENTS.contains(&local) || foreign) {
                out.push_str(if options.output_xhtml { " />" } else { ">" });
                return;
            }

            out.push('>');
            for &child in dom.children(id) {
                write_node(dom, child, options, out);
            }
            out.push_str("</");
            out.push_str(local);
            out.push('>');
        }
        NodeData::Document => {}
    }
}

/// XML-safe attribute name, or `None` when the attribute cannot be written.
///
/// Prefixes other than `xml`, `xlink` and `epub` would be unbound in the
/// output, so those attributes are dropped.
fn attribute_name(prefix: Option<&str>, local: &str) -> Option<String> {
    let qualified = match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    };

    let mut chars = qualified.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')) {
        return None;
    }

    if let Some((prefix, _)) = qualified.split_once(':')
        && !matches!(prefix, "xml" | "xlink" | "epub")
    {
        return None;
    }
    Some(qualified)
}

fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
