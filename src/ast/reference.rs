//! Reference syntax - `{{name}}` and `{{name.field.sub}}`
//!
//! The root segment follows the identifier grammar; field segments may be
//! identifiers or array indices (`{{items.0.title}}`). No whitespace is
//! allowed inside the braces.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;

/// Exact reference syntax (unanchored)
pub const REFERENCE_PATTERN: &str = r"\{\{([a-z_][a-z0-9_]*)((?:\.[A-Za-z0-9_]+)*)\}\}";

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(REFERENCE_PATTERN).unwrap());

/// A parsed `{{root.path...}}` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub root: String,
    pub path: SmallVec<[String; 4]>,
}

impl Reference {
    fn from_captures(root: &str, tail: &str) -> Self {
        Self {
            root: root.to_string(),
            path: tail
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Parse a string that is exactly one reference
    pub fn parse_exact(text: &str) -> Option<Self> {
        let cap = REFERENCE_RE.captures(text)?;
        let whole = cap.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return None;
        }
        Some(Self::from_captures(&cap[1], &cap[2]))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}", self.root)?;
        for segment in &self.path {
            write!(f, ".{}", segment)?;
        }
        write!(f, "}}}}")
    }
}

/// Piece of a string that may interleave literal text and references
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSegment {
    Literal(String),
    Ref(Reference),
}

/// A `{{` that does not open a well-formed reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedReference {
    pub fragment: String,
}

impl fmt::Display for MalformedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed reference near '{}' (expected {{{{name}}}} or {{{{name.field}}}})",
            self.fragment
        )
    }
}

fn check_literal(literal: &str) -> Result<(), MalformedReference> {
    match literal.find("{{") {
        Some(pos) => Err(MalformedReference {
            fragment: literal[pos..].chars().take(24).collect(),
        }),
        None => Ok(()),
    }
}

/// Split a string into literal text and references
///
/// Any `{{` outside a well-formed reference is an error.
pub fn parse_template(text: &str) -> Result<Vec<TextSegment>, MalformedReference> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for cap in REFERENCE_RE.captures_iter(text) {
        let Some(m) = cap.get(0) else { continue };

        let literal = &text[last_end..m.start()];
        check_literal(literal)?;
        if !literal.is_empty() {
            segments.push(TextSegment::Literal(literal.to_string()));
        }

        segments.push(TextSegment::Ref(Reference::from_captures(&cap[1], &cap[2])));
        last_end = m.end();
    }

    let tail = &text[last_end..];
    check_literal(tail)?;
    if !tail.is_empty() {
        segments.push(TextSegment::Literal(tail.to_string()));
    }

    Ok(segments)
}

/// Well-formed references in free text, ignoring anything malformed
pub fn extract_references(text: &str) -> Vec<Reference> {
    REFERENCE_RE
        .captures_iter(text)
        .map(|cap| Reference::from_captures(&cap[1], &cap[2]))
        .collect()
}

/// Every reference in a parameter value, depth first, in document order
pub fn references_in_value(value: &Value) -> Result<Vec<Reference>, MalformedReference> {
    let mut refs = Vec::new();
    collect(value, &mut refs)?;
    Ok(refs)
}

fn collect(value: &Value, refs: &mut Vec<Reference>) -> Result<(), MalformedReference> {
    match value {
        Value::String(s) => {
            for segment in parse_template(s)? {
                if let TextSegment::Ref(r) = segment {
                    refs.push(r);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, refs)?;
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect(v, refs)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}
