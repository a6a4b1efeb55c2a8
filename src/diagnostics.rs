//! Non-fatal conversion diagnostics.
//!
//! Every anomaly met while rebuilding a document is kept as a message,
//! logged, and rendered as an XML comment right before the content it
//! qualifies, so a reader of the output can see where text may be missing
//! or repeated.

use std::fmt::Write;

/// Ordered list of warnings collected during one conversion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and forward it to the log.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.messages.push(message);
    }

    /// Take over warnings that were already logged elsewhere.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = String>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// Render a message as an XML comment on its own line.
pub fn comment(message: &str) -> String {
    format!("<!-- {} -->\n", sanitize_comment(message))
}

/// Render several messages as consecutive comments.
pub fn comments<S: AsRef<str>>(messages: &[S]) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = write!(out, "{}", comment(message.as_ref()));
    }
    out
}

/// Make arbitrary text safe inside `<!-- ... -->`.
///
/// `--` may not appear in a comment and a trailing `-` would merge with the
/// closing delimiter.
pub fn sanitize_comment(message: &str) -> String {
    let mut text = message.to_string();
    while text.contains("--") {
        text = text.replace("--", "- -");
    }
    if text.ends_with('-') {
        text.push(' ');
    }
    text
}

/// Escape a value for a double-quoted XML attribute.
///
/// Entity references already present (`&eacute;`, `&#233;`, `&amp;`) are
/// kept; a bare `&` becomes `&amp;`.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.char_indices() {
        match c {
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '&' if starts_entity(&value[i + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape character data for XML text content.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Does `rest` (the text after an `&`) begin an entity reference?
fn starts_entity(rest: &str) -> bool {
    let Some(semi) = rest.find(';') else {
        return false;
    };
    let name = &rest[..semi];
    if let Some(num) = name.strip_prefix('#') {
        if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
        }
        return !num.is_empty() && num.chars().all(|c| c.is_ascii_digit());
    }
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("Plain"), "Plain");
        assert_eq!(escape_attr(r#"The "Quoted" One"#), "The &quot;Quoted&quot; One");
        assert_eq!(escape_attr("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(escape_attr("AT&T"), "AT&amp;T");
        assert_eq!(escape_attr("Caf&eacute;"), "Caf&eacute;");
        assert_eq!(escape_attr("&#233;t&#xE9;"), "&#233;t&#xE9;");
        assert_eq!(escape_attr("a < b"), "a &lt; b");
        assert_eq!(escape_attr("&;"), "&amp;;");
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
    }

    #[test]
    fn test_sanitize_comment() {
        assert_eq!(sanitize_comment("chapter--one.xhtml"), "chapter- -one.xhtml");
        assert_eq!(sanitize_comment("a---b"), "a- - -b");
        assert_eq!(sanitize_comment("ends-"), "ends- ");
    }

    #[test]
    fn test_comment_rendering() {
        assert_eq!(comment("missing a--b"), "<!-- missing a- -b -->\n");
        assert_eq!(comments(&["one", "two"]), "<!-- one -->\n<!-- two -->\n");
    }

    #[test]
    fn test_diagnostics_collects_in_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("first");
        diagnostics.extend(vec!["second".to_string()]);

        assert_eq!(diagnostics.messages(), ["first", "second"]);
        assert!(!diagnostics.is_empty());
    }

    proptest! {
        #[test]
        fn sanitized_comment_never_breaks_out(message in ".*") {
            let rendered = sanitize_comment(&message);
            prop_assert!(!rendered.contains("--"));
            prop_assert!(!rendered.ends_with('-'));
        }

        #[test]
        fn escaped_attr_has_no_raw_quote_or_lt(value in ".*") {
            let escaped = escape_attr(&value);
            prop_assert!(!escaped.contains('"'));
            prop_assert!(!escaped.contains('<'));
        }
    }
}
