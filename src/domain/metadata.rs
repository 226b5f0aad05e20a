//! Flat string-keyed metadata record embedded at the top of a task document.
//!
//! The on-disk form is a frontmatter block:
//!
//! ```text
//! ---
//! title: "Quarterly report"
//! status: ready
//! priority: P1
//! ---
//! <body>
//! ```
//!
//! [`parse_document`] and [`render_document`] are a serialization pair with
//! the round-trip law `render(parse(x)) == x` whenever `x` came from `render`.

use serde::{Deserialize, Serialize};

const DELIMITER: &str = "---";

/// Ordered key/value record. Insertion order is preserved on render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a value, keeping the key's original position if it already exists.
    ///
    /// Line breaks are flattened to spaces; the record is line-oriented.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = flatten(&value.into());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merge `updates` into this record. Keys absent from `updates` are untouched.
    pub fn merge(&mut self, updates: &Metadata) {
        for (key, value) in &updates.entries {
            self.set(key.clone(), value.clone());
        }
    }

    /// Whether the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Iterate entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten(value: &str) -> String {
    if value.contains(['\n', '\r']) {
        value
            .split(['\n', '\r'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        value.to_string()
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.contains([' ', ',', '"', '\''])
        || value.trim() != value
}

fn render_value(value: &str) -> String {
    if needs_quotes(value) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

fn parse_value(raw: &str) -> String {
    let raw = raw.trim();
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    if quoted {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

/// Render only the frontmatter block (no trailing newline)
pub fn render_metadata(metadata: &Metadata) -> String {
    let mut out = String::from(DELIMITER);
    out.push('\n');
    for (key, value) in metadata.iter() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&render_value(value));
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out
}

/// Render a full document: frontmatter followed verbatim by the body
pub fn render_document(metadata: &Metadata, body: &str) -> String {
    let mut out = render_metadata(metadata);
    out.push_str(body);
    out
}

/// Split a document into its metadata record and body.
///
/// Content without a frontmatter block yields an empty record and the whole
/// content as body.
pub fn parse_document(content: &str) -> (Metadata, String) {
    let Some(rest) = content.strip_prefix("---\n") else {
        return (Metadata::new(), content.to_string());
    };

    let (block, body) = if let Some(after) = rest.strip_prefix(DELIMITER) {
        ("", after)
    } else {
        match rest.find("\n---") {
            Some(idx) => (&rest[..idx], &rest[idx + 4..]),
            None => return (Metadata::new(), content.to_string()),
        }
    };

    let mut metadata = Metadata::new();
    for line in block.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                metadata.set(key, parse_value(value));
            }
        }
    }

    (metadata, body.to_string())
}
