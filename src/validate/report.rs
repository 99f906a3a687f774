//! Validation report - every issue found in one pass
//!
//! Issues are plain data. The report routes each one by severity; only
//! errors block acceptance.

use std::fmt;

use serde::Serialize;

/// Error taxonomy, phrased for the author of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Wrong shape: missing key, wrong JSON type, unknown node type
    Structural,
    /// Identifier grammar, duplicate names
    Naming,
    /// Condition string rejected by the condition grammar
    Condition,
    /// Reference not guaranteed to be bound
    Scope,
    /// Dispatcher rule target or default that does not exist
    Reference,
    /// A complexity cap was exceeded
    Complexity,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Structural => "StructuralError",
            IssueKind::Naming => "NamingError",
            IssueKind::Condition => "ConditionError",
            IssueKind::Scope => "ScopeError",
            IssueKind::Reference => "ReferenceError",
            IssueKind::Complexity => "ComplexityError",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One (path, message) finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Dotted field path, e.g. `workflow.steps[1].if_true.tool`
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.kind, self.message)
        } else {
            write!(f, "{}: {}: {}", self.kind, self.path, self.message)
        }
    }
}

/// All errors and warnings for one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Add an issue to the list matching its severity
    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }

    /// Error count by kind, in taxonomy order
    pub fn count_by_kind(&self) -> Vec<(IssueKind, usize)> {
        [
            IssueKind::Structural,
            IssueKind::Naming,
            IssueKind::Condition,
            IssueKind::Scope,
            IssueKind::Reference,
            IssueKind::Complexity,
        ]
        .into_iter()
        .map(|kind| (kind, self.errors.iter().filter(|e| e.kind == kind).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
    }

    /// One-line summary, e.g. "3 errors (1 NamingError, 2 ScopeError), 1 warning"
    pub fn summary(&self) -> String {
        let mut out = format!("{} error{}", self.errors.len(), plural(self.errors.len()));
        let kinds = self.count_by_kind();
        if !kinds.is_empty() {
            let parts: Vec<String> = kinds.iter().map(|(k, n)| format!("{} {}", n, k)).collect();
            out.push_str(&format!(" ({})", parts.join(", ")));
        }
        if self.has_warnings() {
            out.push_str(&format!(
                ", {} warning{}",
                self.warnings.len(),
                plural(self.warnings.len())
            ));
        }
        out
    }

    /// Plain-text (path, message) list for a corrective request
    ///
    /// Errors only; warnings do not ask the author to change anything.
    pub fn feedback(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "The workflow specification has {} problem{} to fix:\n",
            self.errors.len(),
            plural(self.errors.len())
        ));
        for (i, issue) in self.errors.iter().enumerate() {
            let path = if issue.path.is_empty() { "<document>" } else { &issue.path };
            out.push_str(&format!("{}. [{}] {}: {}\n", i + 1, issue.kind, path, issue.message));
        }
        out
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
