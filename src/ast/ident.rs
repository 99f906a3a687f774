//! Identifier grammar
//!
//! Workflow names, parameter names, tool names, binding targets and
//! sub-workflow names all share one grammar: `[a-z_][a-z0-9_]*`, at most
//! 64 characters. Anything emitted into generated code as a name passes
//! through here first.

use std::fmt;

/// Maximum identifier length
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Why a string is not a valid identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierProblem {
    Empty,
    TooLong { len: usize },
    InvalidStart { ch: char },
    InvalidChar { ch: char, position: usize },
}

impl fmt::Display for IdentifierProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierProblem::Empty => write!(f, "identifier is empty"),
            IdentifierProblem::TooLong { len } => write!(
                f,
                "identifier is {} characters long (max {})",
                len, MAX_IDENTIFIER_LEN
            ),
            IdentifierProblem::InvalidStart { ch } => write!(
                f,
                "identifier must start with a lowercase letter or '_', found '{}'",
                ch
            ),
            IdentifierProblem::InvalidChar { ch, position } => write!(
                f,
                "invalid character '{}' at position {} (use lowercase letters, digits, '_')",
                ch, position
            ),
        }
    }
}

/// Validate an identifier against the restricted grammar
///
/// Single pass over the bytes, no regex.
pub fn validate_identifier(name: &str) -> Result<(), IdentifierProblem> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(IdentifierProblem::Empty),
    };

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LEN {
        return Err(IdentifierProblem::TooLong { len });
    }

    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(IdentifierProblem::InvalidStart { ch: first });
    }

    for (i, ch) in chars.enumerate() {
        if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_') {
            return Err(IdentifierProblem::InvalidChar {
                ch,
                position: i + 1,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case() {
        assert!(validate_identifier("fetch_weather").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("step2").is_ok());
        assert!(validate_identifier("a").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(validate_identifier(""), Err(IdentifierProblem::Empty));
    }

    #[test]
    fn rejects_uppercase_and_hyphen() {
        assert!(matches!(
            validate_identifier("Fetch"),
            Err(IdentifierProblem::InvalidStart { ch: 'F' })
        ));
        assert!(matches!(
            validate_identifier("fetch-data"),
            Err(IdentifierProblem::InvalidChar { ch: '-', position: 5 })
        ));
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(matches!(
            validate_identifier("2fast"),
            Err(IdentifierProblem::InvalidStart { ch: '2' })
        ));
    }

    #[test]
    fn length_bound() {
        let max = "a".repeat(MAX_IDENTIFIER_LEN);
        assert!(validate_identifier(&max).is_ok());

        let over = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_eq!(
            validate_identifier(&over),
            Err(IdentifierProblem::TooLong {
                len: MAX_IDENTIFIER_LEN + 1
            })
        );
    }

    #[test]
    fn problem_messages_are_readable() {
        let msg = validate_identifier("Bad").unwrap_err().to_string();
        assert!(msg.contains("lowercase"));
    }
}
