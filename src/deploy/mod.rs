//! Sequential deployment of classified statements.
//!
//! A run sets up the database and schema context, attaches the query tag,
//! then dispatches statements one at a time and stops at the first failure.
//! Everything that happens is recorded in a [`DeploymentRun`], which renders
//! the persisted deployment log.

mod log;
mod orchestrator;
mod prepare;
mod progress;
mod tagging;

pub use log::DeploymentLog;
pub use orchestrator::Deployer;
pub use prepare::{failure_hints, normalize_trailing_semicolon, preview};
pub use progress::{NoProgress, ProgressSink, TracingProgress};
pub use tagging::QueryTagMethod;

use crate::script::StatementCategory;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// What to deploy against: the operator's tag plus the target context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub query_tag: String,
    pub database: String,
    pub schema: Option<String>,
}

impl DeployRequest {
    pub fn new(query_tag: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            query_tag: query_tag.into(),
            database: database.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases a run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    SettingDatabase,
    SettingSchema,
    SettingQueryTag,
    Executing,
    Completed(RunStatus),
}

/// Per-statement lifecycle. Once one statement fails, the rest stay `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementState {
    Pending,
    Dispatched,
    Succeeded,
    Failed,
}

/// How a dispatched statement ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchResult {
    Succeeded {
        summary: String,
    },
    Failed {
        error: String,
        /// Syntax checks run over the SQL that was sent.
        hints: Vec<String>,
    },
}

/// The record of one dispatched statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub ordinal: usize,
    pub category: StatementCategory,
    /// Exact text handed to the engine, after rewriting and normalization.
    pub sql_sent: String,
    #[serde(flatten)]
    pub result: DispatchResult,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.result, DispatchResult::Succeeded { .. })
    }
}

/// Everything a single deployment produced.
///
/// Built by [`Deployer::run`] and not mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRun {
    pub query_tag: String,
    pub user: String,
    pub role: String,
    pub database: String,
    pub schema: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub status: RunStatus,
    /// Strategy that attached the query tag, if setup got that far.
    pub query_tag_method: Option<QueryTagMethod>,
    /// Context directives the engine could not honor.
    pub notes: Vec<String>,
    pub statement_states: Vec<StatementState>,
    pub outcomes: Vec<ExecutionOutcome>,
    pub entries: DeploymentLog,
}

impl DeploymentRun {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Returns the outcome that halted the run, if a statement failed.
    pub fn failed_outcome(&self) -> Option<&ExecutionOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.succeeded())
    }

    /// Number of statements that never left `Pending`.
    pub fn pending_count(&self) -> usize {
        self.statement_states
            .iter()
            .filter(|state| **state == StatementState::Pending)
            .count()
    }
}
