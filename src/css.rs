//! Semantic style model.
//!
//! Generated books often carry their only semantic hints in CSS, as in
//! `<span class="autostyle02">` with `.autostyle02 { font-style: italic }`.
//! This is not a CSS parser: rules are matched with a pattern, and only the
//! declarations listed in a filter are kept, per selector, so that a later
//! stylesheet pass can turn those classes back into markup.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::diagnostics::escape_attr;

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ims)([a-z0-9\s.:#_@,-]+)\{([^}]*)\}").unwrap());

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Collects style information and renders it for the output template.
pub trait StyleModel {
    /// Add the rules of a stylesheet.
    fn parse(&mut self, css: &str);

    /// Render the model as XML.
    fn as_xml(&self) -> String;
}

/// A property to keep, with the values that make it meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    pub property: String,
    /// Accepted values; empty keeps any value.
    pub values: Vec<String>,
}

impl PropertyFilter {
    pub fn new(property: &str, values: &[&str]) -> Self {
        Self {
            property: property.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn accepts(&self, value: &str) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v.eq_ignore_ascii_case(value))
    }
}

/// Kept declarations of one selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    /// `(property, value)` in first-seen order.
    pub declarations: Vec<(String, String)>,
}

/// [`StyleModel`] keeping semantic declarations only.
#[derive(Debug, Clone)]
pub struct SemanticCss {
    filter: Vec<PropertyFilter>,
    rules: Vec<Rule>,
}

impl Default for SemanticCss {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticCss {
    /// Keeps italics, centered or right alignment, and small caps.
    pub fn new() -> Self {
        Self::with_filter(vec![
            PropertyFilter::new("font-style", &["italic"]),
            PropertyFilter::new("text-align", &["center", "right"]),
            PropertyFilter::new("font-variant", &["small-caps"]),
        ])
    }

    pub fn with_filter(filter: Vec<PropertyFilter>) -> Self {
        Self {
            filter,
            rules: Vec::new(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Declarations of one rule block; `None` values are wanted properties
    /// with an unwanted value, which cancel an earlier kept value.
    fn filter_block(&self, block: &str) -> Vec<(String, Option<String>)> {
        let mut kept: Vec<(String, Option<String>)> = Vec::new();
        for declaration in block.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            let Some(filter) = self.filter.iter().find(|f| f.property == property) else {
                continue;
            };
            let value = filter.accepts(value).then(|| value.to_string());
            match kept.iter_mut().find(|(p, _)| *p == property) {
                Some(slot) => slot.1 = value,
                None => kept.push((property, value)),
            }
        }
        kept
    }

    fn merge(&mut self, selector: &str, declarations: &[(String, Option<String>)]) {
        match self.rules.iter().position(|r| r.selector == selector) {
            Some(index) => {
                let rule = &mut self.rules[index];
                for (property, value) in declarations {
                    let existing = rule.declarations.iter().position(|(p, _)| p == property);
                    match (existing, value) {
                        (Some(i), Some(value)) => rule.declarations[i].1 = value.clone(),
                        (Some(i), None) => {
                            rule.declarations.remove(i);
                        }
                        (None, Some(value)) => {
                            rule.declarations.push((property.clone(), value.clone()))
                        }
                        (None, None) => {}
                    }
                }
                if rule.declarations.is_empty() {
                    self.rules.remove(index);
                }
            }
            None => {
                let kept: Vec<(String, String)> = declarations
                    .iter()
                    .filter_map(|(p, v)| v.as_ref().map(|v| (p.clone(), v.clone())))
                    .collect();
                if !kept.is_empty() {
                    self.rules.push(Rule {
                        selector: selector.to_string(),
                        declarations: kept,
                    });
                }
            }
        }
    }
}

impl StyleModel for SemanticCss {
    fn parse(&mut self, css: &str) {
        let css = COMMENT_RE.replace_all(css, "");
        for caps in RULE_RE.captures_iter(&css) {
            let (Some(selectors), Some(block)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let declarations = self.filter_block(block.as_str());
            if declarations.is_empty() {
                continue;
            }
            for selector in selectors.as_str().split(',') {
                let selector = selector.split_whitespace().collect::<Vec<_>>().join(" ");
                if !selector.is_empty() {
                    self.merge(&selector, &declarations);
                }
            }
        }
    }

    fn as_xml(&self) -> String {
        let mut xml = String::from("<css>\n");
        for rule in &self.rules {
            xml.push_str(&format!("  <rule selector=\"{}\">\n", escape_attr(&rule.selector)));
            for (property, value) in &rule.declarations {
                xml.push_str(&format!(
                    "    <declaration property=\"{}\" value=\"{}\"/>\n",
                    escape_attr(property),
                    escape_attr(value)
                ));
            }
            xml.push_str("  </rule>\n");
        }
        xml.push_str("</css>\n");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_semantic_declarations_only() {
        let mut css = SemanticCss::new();
        css.parse(
            ".autostyle02 { font-style: italic; color: red }\n\
             p.center, .c2 { text-align: center; margin: 0 }\n\
             .plain { font-style: normal }\n\
             body { font-family: serif }",
        );

        assert_eq!(
            css.rules(),
            &[
                Rule {
                    selector: ".autostyle02".to_string(),
                    declarations: vec![("font-style".to_string(), "italic".to_string())],
                },
                Rule {
                    selector: "p.center".to_string(),
                    declarations: vec![("text-align".to_string(), "center".to_string())],
                },
                Rule {
                    selector: ".c2".to_string(),
                    declarations: vec![("text-align".to_string(), "center".to_string())],
                },
            ]
        );
    }

    #[test]
    fn test_unwanted_value_cancels_earlier_rule() {
        let mut css = SemanticCss::new();
        css.parse(".a { font-style: italic; text-align: right }");
        css.parse(".a { font-style: normal }");
        assert_eq!(
            css.rules()[0].declarations,
            vec![("text-align".to_string(), "right".to_string())]
        );

        css.parse(".a { text-align: left }");
        assert!(css.is_empty());
    }

    #[test]
    fn test_repeated_selectors_merge() {
        let mut css = SemanticCss::new();
        css.parse(".sc { font-variant: small-caps }\n.sc { text-align: center }");
        assert_eq!(css.rules().len(), 1);
        assert_eq!(css.rules()[0].declarations.len(), 2);
    }

    #[test]
    fn test_comments_and_important() {
        let mut css = SemanticCss::new();
        css.parse("/* .x { font-style: italic } */\n.y { font-style: italic !important }");
        assert_eq!(css.rules().len(), 1);
        assert_eq!(css.rules()[0].selector, ".y");
        assert_eq!(css.rules()[0].declarations[0].1, "italic");
    }

    #[test]
    fn test_custom_filter() {
        let mut css = SemanticCss::with_filter(vec![PropertyFilter::new("font-weight", &[])]);
        css.parse("b, .bold { font-weight: 700 }");
        assert_eq!(css.rules().len(), 2);
        assert_eq!(css.rules()[1].declarations[0].1, "700");
    }

    #[test]
    fn test_as_xml() {
        let mut css = SemanticCss::new();
        assert_eq!(css.as_xml(), "<css>\n</css>\n");

        css.parse(".i { font-style: italic }");
        assert_eq!(
            css.as_xml(),
            "<css>\n  <rule selector=\".i\">\n    <declaration property=\"font-style\" value=\"italic\"/>\n  </rule>\n</css>\n"
        );
    }
}
