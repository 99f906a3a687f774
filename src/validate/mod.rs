//! Validation - candidate document to accepted workflow
//!
//! Three passes over one document, all feeding one report:
//! 1. lowering (shape, naming, condition grammar, dispatcher references)
//! 2. complexity caps
//! 3. scope analysis (only once every node had a usable shape)
//!
//! The whole document is accepted or none of it is: a `ValidatedWorkflow`
//! exists only when the report holds no errors.

mod lower;
mod report;

pub use report::{IssueKind, Severity, ValidationIssue, ValidationReport};

use serde_json::Value;
use tracing::{debug, warn};

use crate::ast::WorkflowSpec;
use crate::error::{Result, ToolflowError};
use crate::limits::{check_complexity, Limits};
use crate::scope::analyze_spec;

/// A workflow that passed every check
///
/// Only the validator can build one, and it cannot be mutated afterwards.
#[derive(Debug, Clone)]
pub struct ValidatedWorkflow {
    spec: WorkflowSpec,
    warnings: Vec<ValidationIssue>,
}

impl ValidatedWorkflow {
    pub(crate) fn new(spec: WorkflowSpec, warnings: Vec<ValidationIssue>) -> Self {
        Self { spec, warnings }
    }

    pub fn spec(&self) -> &WorkflowSpec {
        &self.spec
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }
}

/// Validates candidate documents against a set of complexity caps
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: Limits,
}

impl Validator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Validate and accept, or fail with the full report
    pub fn validate(&self, doc: &Value) -> Result<ValidatedWorkflow> {
        let (spec, report) = self.run(doc);
        match spec {
            Some(spec) if report.is_valid() => {
                for w in &report.warnings {
                    warn!(path = %w.path, "{}", w.message);
                }
                Ok(ValidatedWorkflow::new(spec, report.warnings))
            }
            _ => Err(ToolflowError::ValidationFailed { report }),
        }
    }

    /// Every error and warning, without accepting anything
    pub fn check(&self, doc: &Value) -> ValidationReport {
        self.run(doc).1
    }

    fn run(&self, doc: &Value) -> (Option<WorkflowSpec>, ValidationReport) {
        let mut report = ValidationReport::new();
        let spec = lower::lower_document(doc, &mut report);

        if let Some(ref spec) = spec {
            for v in check_complexity(&spec.workflow, "workflow", &self.limits) {
                report.push(ValidationIssue::error(IssueKind::Complexity, v.path, v.message));
            }

            let scope = analyze_spec(spec);
            for e in &scope.errors {
                report.push(ValidationIssue::error(IssueKind::Scope, &e.path, e.to_string()));
            }
            for w in scope.warnings {
                report.push(ValidationIssue::warning(IssueKind::Scope, w.path, w.message));
            }
        }

        debug!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            analyzed = spec.is_some(),
            "validation finished"
        );
        (spec, report)
    }
}

/// Validate with default limits
pub fn validate(doc: &Value) -> Result<ValidatedWorkflow> {
    Validator::default().validate(doc)
}
