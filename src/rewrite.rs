//! Regex rewrite tables run over intermediate markup.
//!
//! DOCX conversion runs one between its stylesheets; EPUB output can run one
//! over the assembled sections before they are wrapped.

use std::sync::LazyLock;

use regex_lite::Regex;

static BACKREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([0-9]+)").unwrap());

/// One search and replace step.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub pattern: Regex,
    pub replacement: String,
}

/// Ordered rewrite program, usually loaded from a tab separated file.
#[derive(Debug, Clone, Default)]
pub struct Rewrites {
    rules: Vec<Rewrite>,
}

impl Rewrites {
    /// Parse a rewrite table.
    ///
    /// The first line is a header. Each following row is
    /// `pattern<TAB>replacement`; rows starting with `#` are comments, and a
    /// row whose pattern starts with `($` defines a macro expanded in later
    /// patterns. In replacements `\1` is a group reference, `\n` and `\t`
    /// are newline and tab. Patterns that do not compile are skipped with a
    /// warning.
    pub fn parse(tsv: &str) -> Self {
        let mut macros: Vec<(String, String)> = Vec::new();
        let mut rules = Vec::new();

        for (n, line) in tsv.lines().enumerate().skip(1) {
            let (search, replace) = line.split_once('\t').unwrap_or((line, ""));
            let key = search.trim();
            if key.is_empty() || key.starts_with('#') {
                continue;
            }
            if key.starts_with("($") {
                let value = expand(replace, &macros);
                macros.push((key.to_string(), value));
                continue;
            }

            let source = format!("(?s){}", expand(search, &macros));
            match Regex::new(&source) {
                Ok(pattern) => {
                    let replacement = BACKREF_RE
                        .replace_all(replace, "$${${1}}")
                        .replace("\\n", "\n")
                        .replace("\\t", "\t");
                    rules.push(Rewrite {
                        pattern,
                        replacement,
                    });
                }
                Err(e) => tracing::warn!("rewrite line {}: {e}", n + 1),
            }
        }
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn push(&mut self, rewrite: Rewrite) {
        self.rules.push(rewrite);
    }

    /// Run every rule in order over `text`.
    pub fn apply(&self, text: &str) -> String {
        let mut text = text.to_string();
        for rule in &self.rules {
            text = rule
                .pattern
                .replace_all(&text, rule.replacement.as_str())
                .into_owned();
        }
        text
    }
}

fn expand(text: &str, macros: &[(String, String)]) -> String {
    macros
        .iter()
        .fold(text.to_string(), |acc, (name, value)| acc.replace(name, value))
}
