//! Python expressions for parameter values and conditions
//!
//! Literals go through JSON string escaping, which is a subset of Python's
//! string escapes. References become `ctx.get(...)` lookups with numeric
//! field segments passed as ints.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::ast::{parse_template, Reference, TextSegment, REFERENCE_PATTERN};
use crate::error::{Result, ToolflowError};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(REFERENCE_PATTERN).unwrap());

/// Lowercase Python keywords; parameters named like these go through `**{...}`
const PY_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

pub(crate) fn is_py_keyword(name: &str) -> bool {
    PY_KEYWORDS.contains(&name)
}

/// Double-quoted Python string literal
pub(crate) fn py_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Python literal for a JSON value with no references in it
pub(crate) fn literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => py_str(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", py_str(k), literal(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// `ctx.get("root", "field", 0)`
pub(crate) fn lookup(reference: &Reference) -> String {
    let mut args = vec![py_str(&reference.root)];
    for segment in &reference.path {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            let digits = segment.trim_start_matches('0');
            args.push(if digits.is_empty() { "0" } else { digits }.to_string());
        } else {
            args.push(py_str(segment));
        }
    }
    format!("ctx.get({})", args.join(", "))
}

/// Expression for a parameter value, resolving references against `ctx`
pub(crate) fn value_expr(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => string_expr(s),
        Value::Array(items) => {
            let parts = items.iter().map(value_expr).collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", parts.join(", ")))
        }
        Value::Object(map) => {
            let parts = map
                .iter()
                .map(|(k, v)| Ok(format!("{}: {}", py_str(k), value_expr(v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{{{}}}", parts.join(", ")))
        }
        other => Ok(literal(other)),
    }
}

fn string_expr(s: &str) -> Result<String> {
    let segments = parse_template(s).map_err(|e| ToolflowError::GenerationError {
        reason: format!("accepted workflow carries {}", e),
    })?;

    match segments.as_slice() {
        [] => Ok(py_str("")),
        [TextSegment::Literal(text)] => Ok(py_str(text)),
        [TextSegment::Ref(reference)] => Ok(lookup(reference)),
        many => {
            let parts: Vec<String> = many
                .iter()
                .map(|segment| match segment {
                    TextSegment::Literal(text) => py_str(text),
                    TextSegment::Ref(reference) => lookup(reference),
                })
                .collect();
            Ok(format!("_text({})", parts.join(", ")))
        }
    }
}

/// Condition with every reference rewritten to a lookup
pub(crate) fn condition_expr(condition: &str) -> String {
    REFERENCE_RE
        .replace_all(condition.trim(), |cap: &Captures| {
            let root = &cap[1];
            let tail = &cap[2];
            lookup(&Reference {
                root: root.to_string(),
                path: tail
                    .split('.')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .into_owned()
}
