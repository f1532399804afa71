//! Script segmentation and statement classification.
//!
//! Splits a raw multi-statement SQL script into individually executable
//! statements and tags each one with a category derived from its leading
//! keywords. Classification is lexical only; nothing here builds an AST.

mod classifier;
mod segmenter;

pub use classifier::{classify, classify_all};
pub use segmenter::segment;

use serde::{Serialize, Serializer};
use std::fmt;

/// A single executable statement cut from a script.
///
/// Ordinals are 1-based and follow the order of appearance in the script,
/// which is also the execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Statement text with surrounding whitespace trimmed.
    pub text: String,
    /// Position of the statement in the script, starting at 1.
    pub ordinal: usize,
}

impl Statement {
    /// Creates a statement at the given position.
    pub fn new(text: impl Into<String>, ordinal: usize) -> Self {
        Self {
            text: text.into(),
            ordinal,
        }
    }
}

/// Statement category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementCategory {
    CreateProcedure,
    CreateFunction,
    CreateTable,
    CreateView,
    CreateSchema,
    CreateDatabase,
    CreateTask,
    CreateStream,
    CreateStage,
    CreatePipe,
    /// CREATE of an object kind not listed above.
    Create,
    Alter,
    Drop,
    Truncate,
    Insert,
    Update,
    Delete,
    Merge,
    Select,
    /// A query introduced by a WITH clause.
    SelectCte,
    Call,
    Execute,
    BeginTransaction,
    /// BEGIN opening an anonymous procedural block.
    BeginBlock,
    Commit,
    Rollback,
    Copy,
    Put,
    Get,
    Grant,
    Revoke,
    Use,
    Set,
    Show,
    Describe,
    /// Nothing matched; the statement is still dispatched.
    Sql,
}

/// Category prefixes routed to the definition primitive.
const DEFINITION_PREFIXES: [&str; 11] = [
    "CREATE", "ALTER", "DROP", "TRUNCATE", "GRANT", "REVOKE", "BEGIN", "COMMIT", "ROLLBACK",
    "USE", "SET",
];

impl StatementCategory {
    /// Returns the display label used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateProcedure => "CREATE PROCEDURE",
            Self::CreateFunction => "CREATE FUNCTION",
            Self::CreateTable => "CREATE TABLE",
            Self::CreateView => "CREATE VIEW",
            Self::CreateSchema => "CREATE SCHEMA",
            Self::CreateDatabase => "CREATE DATABASE",
            Self::CreateTask => "CREATE TASK",
            Self::CreateStream => "CREATE STREAM",
            Self::CreateStage => "CREATE STAGE",
            Self::CreatePipe => "CREATE PIPE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Merge => "MERGE",
            Self::Select => "SELECT",
            Self::SelectCte => "SELECT (CTE)",
            Self::Call => "CALL PROCEDURE",
            Self::Execute => "EXECUTE",
            Self::BeginTransaction => "BEGIN TRANSACTION",
            Self::BeginBlock => "BEGIN BLOCK",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Copy => "COPY",
            Self::Put => "PUT",
            Self::Get => "GET",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Use => "USE",
            Self::Set => "SET",
            Self::Show => "SHOW",
            Self::Describe => "DESCRIBE",
            Self::Sql => "SQL",
        }
    }

    /// Returns true for CREATE PROCEDURE and CREATE FUNCTION.
    ///
    /// These carry dollar-quoted bodies and get delimiter linting, no tag
    /// comment rewriting, and a parse hint on failure.
    pub fn is_routine_definition(&self) -> bool {
        matches!(self, Self::CreateProcedure | Self::CreateFunction)
    }

    /// Returns true if the statement goes through the definition primitive
    /// rather than the query primitive.
    pub fn uses_definition_primitive(&self) -> bool {
        let label = self.as_str();
        DEFINITION_PREFIXES
            .iter()
            .any(|prefix| label.starts_with(prefix))
    }

    /// Returns true for statements that can permanently remove data.
    pub fn is_data_removing(&self) -> bool {
        matches!(self, Self::Drop | Self::Truncate | Self::Delete)
    }
}

impl fmt::Display for StatementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatementCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A statement paired with its category for one pipeline run.
///
/// The category lives here rather than on [`Statement`] so the same
/// statement can be reclassified without copying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedStatement {
    pub statement: Statement,
    pub category: StatementCategory,
}

impl ClassifiedStatement {
    /// Returns the statement text.
    pub fn text(&self) -> &str {
        &self.statement.text
    }

    /// Returns the statement's 1-based position.
    pub fn ordinal(&self) -> usize {
        self.statement.ordinal
    }
}
