//! Toolflow Error Types with Error Codes
//!
//! Error code ranges:
//! - TF-000-009: Document errors (read, parse)
//! - TF-010-019: Specification defects (validation report)
//! - TF-020-029: Generator errors (internal, never fed back to the author)
//! - TF-030-039: Configuration errors
//!
//! Validation problems are plain data (`ValidationIssue`) while the validator
//! runs; they only become a `ToolflowError` at the API boundary, wrapped whole
//! in `ValidationFailed` so the caller always sees every issue at once.

use miette::Diagnostic;
use thiserror::Error;

use crate::validate::ValidationReport;

pub type Result<T> = std::result::Result<T, ToolflowError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug, Diagnostic)]
pub enum ToolflowError {
    // ═══════════════════════════════════════════
    // DOCUMENT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[TF-001] Failed to parse workflow document: {details}")]
    #[diagnostic(
        code(toolflow::parse_error),
        help("The document must be a JSON (or YAML) object")
    )]
    ParseError { details: String },

    #[error("[TF-002] Workflow file not found: {path}")]
    #[diagnostic(code(toolflow::document_not_found))]
    DocumentNotFound { path: String },

    #[error("[TF-003] IO error: {0}")]
    #[diagnostic(code(toolflow::io))]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════
    // SPECIFICATION DEFECTS (010-019)
    // ═══════════════════════════════════════════
    #[error("[TF-010] Workflow specification rejected: {}", report.summary())]
    #[diagnostic(
        code(toolflow::validation_failed),
        help("Every issue is listed with its field path; fix them all and resubmit")
    )]
    ValidationFailed { report: ValidationReport },

    // ═══════════════════════════════════════════
    // GENERATOR ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[TF-020] Internal generator error: {reason}")]
    #[diagnostic(
        code(toolflow::generation_error),
        help("This is a compiler bug, not a problem with the workflow document")
    )]
    GenerationError { reason: String },

    #[error("[TF-021] Failed to serialize workflow: {details}")]
    #[diagnostic(code(toolflow::serialize_error))]
    SerializeError { details: String },

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[TF-030] Configuration error: {reason}")]
    #[diagnostic(code(toolflow::config_error))]
    ConfigError { reason: String },
}

impl ToolflowError {
    /// Error code (e.g. "TF-010")
    pub fn code(&self) -> &'static str {
        match self {
            ToolflowError::ParseError { .. } => "TF-001",
            ToolflowError::DocumentNotFound { .. } => "TF-002",
            ToolflowError::Io(_) => "TF-003",
            ToolflowError::ValidationFailed { .. } => "TF-010",
            ToolflowError::GenerationError { .. } => "TF-020",
            ToolflowError::SerializeError { .. } => "TF-021",
            ToolflowError::ConfigError { .. } => "TF-030",
        }
    }

    /// True when the failure is the author's to fix.
    ///
    /// Only these errors may be handed back to the inference stage as
    /// corrective feedback. Generator failures are compiler bugs.
    pub fn is_specification_defect(&self) -> bool {
        matches!(
            self,
            ToolflowError::ParseError { .. } | ToolflowError::ValidationFailed { .. }
        )
    }

    /// The validation report, when this error carries one
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ToolflowError::ValidationFailed { report } => Some(report),
            _ => None,
        }
    }
}

impl FixSuggestion for ToolflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ToolflowError::ParseError { .. } => Some("Check JSON/YAML syntax: quoting and nesting"),
            ToolflowError::DocumentNotFound { .. } => Some("Check the file path exists"),
            ToolflowError::Io(_) => Some("Check file path and permissions"),
            ToolflowError::ValidationFailed { .. } => {
                Some("Run `toolflow check <file>` to see every issue with its path")
            }
            ToolflowError::GenerationError { .. } => {
                Some("Report this as a toolflow bug together with the input document")
            }
            ToolflowError::SerializeError { .. } => None,
            ToolflowError::ConfigError { .. } => {
                Some("Check the TOML syntax of the config file (see TOOLFLOW_CONFIG)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{IssueKind, ValidationIssue};

    #[test]
    fn generation_error_is_not_a_spec_defect() {
        let err = ToolflowError::GenerationError {
            reason: "unbalanced brackets".to_string(),
        };
        assert!(!err.is_specification_defect());
        assert_eq!(err.code(), "TF-020");
        assert!(err.to_string().contains("Internal generator error"));
    }

    #[test]
    fn validation_failed_is_a_spec_defect_and_carries_report() {
        let mut report = ValidationReport::new();
        report.push(ValidationIssue::error(
            IssueKind::Naming,
            "name",
            "'Bad' is not a valid identifier",
        ));
        let err = ToolflowError::ValidationFailed { report };

        assert!(err.is_specification_defect());
        assert_eq!(err.report().map(|r| r.errors.len()), Some(1));
        assert!(err.to_string().contains("TF-010"));
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ToolflowError = io.into();
        assert_eq!(err.code(), "TF-003");
    }
}
