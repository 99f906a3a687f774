//! Condition Grammar - safe boolean expressions
//!
//! Conditions are pasted into generated code after `{{...}}` references are
//! rewritten, so the text itself is the attack surface. Checks run in a
//! fixed order:
//!
//! 1. empty / whitespace-only
//! 2. deny-list (statement separators, assignment, code execution,
//!    file access, attribute introspection, module paths, dunders)
//! 3. allow-list: at least one comparison or logical operator
//! 4. every `{`, `}` or `$` belongs to a well-formed `{{name.field}}`
//! 5. quotes and brackets balance; no `#` or `\\` outside string literals;
//!    outside literals only ASCII, and every bare name is an operator keyword
//!    or one of a few pure builtins (attribute names may not start with `_`)
//!
//! The deny-list always runs before the allow-list, so a legal operator
//! never vouches for a dangerous token next to it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::REFERENCE_PATTERN;

/// Code execution, file access and introspection primitives
const DENIED_WORDS: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "import",
    "open",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "globals",
    "locals",
    "vars",
    "breakpoint",
    "lambda",
];

/// Modules that look like a path into the standard library
const DENIED_MODULES: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "shutil",
    "pathlib",
    "importlib",
    "builtins",
    "socket",
    "io",
];

/// Bare names a condition may use besides references
const ALLOWED_NAMES: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "None", "True", "False", "len", "str", "int",
    "float", "bool", "abs", "min", "max", "round", "sum", "any", "all", "sorted",
];

/// Comparison operators accepted by the allow-list
const SYMBOL_OPERATORS: &[&str] = &[">=", "<=", "==", "!=", ">", "<"];

static DENIED_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", DENIED_WORDS.join("|"))).unwrap()
});

static MODULE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\s*\.", DENIED_MODULES.join("|"))).unwrap()
});

static DUNDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__\w+__").unwrap());

/// A single `=` that is not part of `==`, `!=`, `<=`, `>=`, or a `:=`
static ASSIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^=!<>:])=(?:$|[^=])|:=").unwrap());

static WORD_OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:and|or|not|in|is)\b").unwrap());

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(REFERENCE_PATTERN).unwrap());

/// Why a condition string was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    Empty,
    StatementSeparator,
    Assignment,
    ForbiddenToken { token: String },
    UnknownName { name: String },
    NoOperator,
    MalformedReference { fragment: String },
    Unbalanced { detail: String },
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionError::Empty => write!(f, "condition is empty"),
            ConditionError::StatementSeparator => {
                write!(f, "condition must be a single expression (no ';' or line breaks)")
            }
            ConditionError::Assignment => {
                write!(f, "condition contains an assignment; use '==' to compare")
            }
            ConditionError::ForbiddenToken { token } => {
                write!(f, "condition contains forbidden token '{}'", token)
            }
            ConditionError::UnknownName { name } => write!(
                f,
                "condition uses '{}', which is neither a {{{{reference}}}} nor an allowed name ({})",
                name,
                ALLOWED_NAMES.join(", ")
            ),
            ConditionError::NoOperator => write!(
                f,
                "condition has no comparison or logical operator (> < == != >= <= and or not in is)"
            ),
            ConditionError::MalformedReference { fragment } => write!(
                f,
                "malformed reference '{}' in condition (expected {{{{name}}}} or {{{{name.field}}}})",
                fragment
            ),
            ConditionError::Unbalanced { detail } => write!(f, "condition is not well formed: {}", detail),
        }
    }
}

/// Validate a condition string, returning it unchanged on success
pub fn validate_condition(condition: &str) -> Result<&str, ConditionError> {
    if condition.trim().is_empty() {
        return Err(ConditionError::Empty);
    }

    check_denied(condition)?;

    if !has_operator(condition) {
        return Err(ConditionError::NoOperator);
    }

    check_references(condition)?;
    check_lexical(&REFERENCE_RE.replace_all(condition, "0"))?;

    Ok(condition)
}

fn check_denied(condition: &str) -> Result<(), ConditionError> {
    if condition.contains([';', '\n', '\r']) {
        return Err(ConditionError::StatementSeparator);
    }

    if let Some(c) = condition.chars().find(|c| c.is_control() && *c != '\t') {
        return Err(ConditionError::ForbiddenToken {
            token: c.escape_unicode().to_string(),
        });
    }

    if let Some(m) = DUNDER_RE.find(condition) {
        return Err(ConditionError::ForbiddenToken {
            token: m.as_str().to_string(),
        });
    }

    if let Some(m) = DENIED_WORD_RE.find(condition) {
        return Err(ConditionError::ForbiddenToken {
            token: m.as_str().to_string(),
        });
    }

    if let Some(m) = MODULE_PATH_RE.find(condition) {
        return Err(ConditionError::ForbiddenToken {
            token: m.as_str().trim_end_matches('.').trim().to_string(),
        });
    }

    if ASSIGNMENT_RE.is_match(condition) {
        return Err(ConditionError::Assignment);
    }

    Ok(())
}

fn has_operator(condition: &str) -> bool {
    SYMBOL_OPERATORS.iter().any(|op| condition.contains(op)) || WORD_OPERATOR_RE.is_match(condition)
}

fn check_references(condition: &str) -> Result<(), ConditionError> {
    let stripped = REFERENCE_RE.replace_all(condition, "");
    match stripped.find(['{', '}', '$']) {
        Some(pos) => Err(ConditionError::MalformedReference {
            fragment: stripped[pos..].chars().take(24).collect(),
        }),
        None => Ok(()),
    }
}

/// String literals must close, brackets must pair up, and nothing outside a
/// literal may start a comment, continue the line, leave ASCII, or name
/// anything beyond [`ALLOWED_NAMES`]
fn check_lexical(text: &str) -> Result<(), ConditionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut after_dot = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\'' | '"' => {
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '\\' {
                        i += 2;
                        continue;
                    }
                    if chars[i] == ch {
                        closed = true;
                        break;
                    }
                    i += 1;
                }
                if !closed {
                    return Err(ConditionError::Unbalanced {
                        detail: format!("unterminated string literal (missing {})", ch),
                    });
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                check_name(&name, after_dot)?;
                after_dot = false;
                continue;
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                after_dot = false;
                continue;
            }
            '.' => {
                after_dot = true;
                i += 1;
                continue;
            }
            '(' | '[' => stack.push(ch),
            ')' | ']' => {
                let open = if ch == ')' { '(' } else { '[' };
                if stack.pop() != Some(open) {
                    return Err(ConditionError::Unbalanced {
                        detail: format!("unexpected '{}'", ch),
                    });
                }
            }
            '#' | '\\' => {
                return Err(ConditionError::ForbiddenToken {
                    token: ch.to_string(),
                })
            }
            c if !c.is_ascii() => {
                return Err(ConditionError::ForbiddenToken {
                    token: c.to_string(),
                })
            }
            c if c.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            _ => {}
        }
        after_dot = false;
        i += 1;
    }
    match stack.last() {
        Some(open) => Err(ConditionError::Unbalanced {
            detail: format!("'{}' is never closed", open),
        }),
        None => Ok(()),
    }
}

/// Attributes are free except private ones; bare names must be allowed
fn check_name(name: &str, attribute: bool) -> Result<(), ConditionError> {
    if attribute {
        if name.starts_with('_') {
            return Err(ConditionError::ForbiddenToken {
                token: name.to_string(),
            });
        }
        return Ok(());
    }
    if ALLOWED_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(ConditionError::UnknownName {
            name: name.to_string(),
        })
    }
}
