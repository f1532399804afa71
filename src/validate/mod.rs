//! Structural lint for classified statements.
//!
//! Flags authoring mistakes that the engine is likely to reject, mostly
//! around dollar-quoted procedure bodies, plus a few advisory warnings for
//! destructive or privileged statements. Findings are reported as data and
//! never stop a deployment; the engine gets the final word.

mod rules;

pub use rules::validate;

use serde::Serialize;
use std::fmt;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    /// The statement will almost certainly be rejected by the engine.
    Error,
    /// Worth a second look before deploying.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

/// A single lint finding tied to a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// 1-based position of the offending statement.
    pub statement_ordinal: usize,
    /// Label of the statement's category, or the subject of the warning.
    pub subject: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(ordinal: usize, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            statement_ordinal: ordinal,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(ordinal: usize, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            statement_ordinal: ordinal,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[statement {}] {}: {}",
            self.statement_ordinal, self.subject, self.message
        )
    }
}

/// Ordered errors and warnings for a whole script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true if there are no findings at all.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Returns true if any error-severity finding exists.
    ///
    /// Advisory only; callers must not use this to block a deployment.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }
}
