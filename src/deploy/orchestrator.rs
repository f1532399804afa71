//! The deployment state machine.

use super::log::{event_timestamp, DeploymentLog};
use super::prepare::{self, EXECUTED_SUCCESSFULLY};
use super::progress::{self, NoProgress, ProgressSink};
use super::tagging::{self, QueryTagMethod};
use super::{
    DeployRequest, DeploymentRun, DispatchResult, ExecutionOutcome, RunPhase, RunStatus,
    StatementState,
};
use crate::db::{ContextSwitch, DeployTarget, QueryResult};
use crate::error::Result;
use crate::script::ClassifiedStatement;
use chrono::Local;
use tracing::{debug, error, info, warn};

/// Recorded in place of a user or role the engine would not report.
const UNKNOWN_IDENTITY: &str = "Unknown";

/// Runs classified statements against a target, one at a time.
pub struct Deployer<'a> {
    target: &'a dyn DeployTarget,
    progress: &'a dyn ProgressSink,
}

/// Mutable state of a run in flight.
struct RunState {
    phase: RunPhase,
    log: DeploymentLog,
    notes: Vec<String>,
    query_tag_method: Option<QueryTagMethod>,
    statement_states: Vec<StatementState>,
    outcomes: Vec<ExecutionOutcome>,
    failed: bool,
}

/// Session identity captured at the start of a run.
struct Identity {
    user: String,
    role: String,
}

impl<'a> Deployer<'a> {
    pub fn new(target: &'a dyn DeployTarget) -> Self {
        Self {
            target,
            progress: &NoProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Deploys `statements` in order and returns the finished run.
    ///
    /// Never returns an error: setup failures and statement failures both
    /// end up as a `Failed` run with the cause in its log.
    pub async fn run(
        &self,
        request: &DeployRequest,
        statements: &[ClassifiedStatement],
    ) -> DeploymentRun {
        let started_at = Local::now();
        let identity = self.identity().await;

        let mut state = RunState {
            phase: RunPhase::Initializing,
            log: DeploymentLog::new(),
            notes: Vec::new(),
            query_tag_method: None,
            statement_states: vec![StatementState::Pending; statements.len()],
            outcomes: Vec::new(),
            failed: false,
        };

        info!(
            tag = %request.query_tag,
            database = %request.database,
            statements = statements.len(),
            "Starting deployment on {}",
            self.target.name()
        );

        if let Err(e) = self.execute(request, statements, &identity, &mut state).await {
            error!(phase = ?state.phase, "Deployment aborted: {}", e);
            state.failed = true;
            state.log.event(format!("ERROR: {e}"));
        }

        self.progress.report(progress::COMPLETE, "Deployment finished");

        let status = if state.failed {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        self.enter(&mut state, RunPhase::Completed(status));

        DeploymentRun {
            query_tag: request.query_tag.clone(),
            user: identity.user,
            role: identity.role,
            database: request.database.clone(),
            schema: request.schema.clone(),
            started_at,
            finished_at: Local::now(),
            status,
            query_tag_method: state.query_tag_method,
            notes: state.notes,
            statement_states: state.statement_states,
            outcomes: state.outcomes,
            entries: state.log,
        }
    }

    async fn identity(&self) -> Identity {
        let user = self.target.current_user().await.unwrap_or_else(|e| {
            warn!("Could not read current user: {}", e);
            UNKNOWN_IDENTITY.to_string()
        });
        let role = self.target.current_role().await.unwrap_or_else(|e| {
            warn!("Could not read current role: {}", e);
            UNKNOWN_IDENTITY.to_string()
        });
        Identity { user, role }
    }

    fn enter(&self, state: &mut RunState, phase: RunPhase) {
        debug!(from = ?state.phase, to = ?phase, "Run phase change");
        state.phase = phase;
    }

    /// Setup phases followed by the dispatch loop. An `Err` here is a
    /// run-level failure.
    async fn execute(
        &self,
        request: &DeployRequest,
        statements: &[ClassifiedStatement],
        identity: &Identity,
        state: &mut RunState,
    ) -> Result<()> {
        state.log.event("Connected");
        state.log.event(format!(
            "User: {}, Role: {}",
            identity.user, identity.role
        ));
        self.progress.report(progress::CONNECTED, "Connected");

        self.enter(state, RunPhase::SettingDatabase);
        self.progress
            .report(progress::CONNECTED, &format!("Setting database: {}", request.database));
        let switch = tolerate_unsupported(
            self.target.set_database_context(&request.database).await,
        )?;
        record_context(state, "Database", &request.database, switch);
        self.progress.report(progress::DATABASE_SET, "Database context ready");

        if let Some(schema) = &request.schema {
            self.enter(state, RunPhase::SettingSchema);
            self.progress
                .report(progress::DATABASE_SET, &format!("Setting schema: {schema}"));
            let switch = tolerate_unsupported(self.target.set_schema_context(schema).await)?;
            record_context(state, "Schema", schema, switch);
        }
        self.progress.report(progress::SCHEMA_SET, "Schema context ready");

        self.enter(state, RunPhase::SettingQueryTag);
        let method = tagging::attach_query_tag(self.target, &request.query_tag).await;
        state.query_tag_method = Some(method);
        if method.rewrites_statements() {
            state.log.event(format!(
                "Query tag will be embedded as SQL comment: /* QUERY_TAG: {} */",
                request.query_tag
            ));
        } else {
            state.log.event(format!(
                "Query tag set via {method}: {}",
                request.query_tag
            ));
        }
        info!(method = %method, "Query tag attached");
        self.progress.report(progress::QUERY_TAG_SET, "Query tag attached");

        self.enter(state, RunPhase::Executing);
        if statements.is_empty() {
            info!("No statements to execute");
            state.log.event("No statements to execute");
            return Ok(());
        }

        let total = statements.len();
        for (index, statement) in statements.iter().enumerate() {
            self.progress.report(
                progress::statement_percent(index + 1, total),
                &format!("Executing statement {} of {}", index + 1, total),
            );

            state.statement_states[index] = StatementState::Dispatched;
            let outcome = self
                .dispatch(statement, method, request, identity, &mut state.log)
                .await;

            if outcome.succeeded() {
                state.statement_states[index] = StatementState::Succeeded;
                state.outcomes.push(outcome);
            } else {
                warn!(
                    ordinal = outcome.ordinal,
                    category = %outcome.category,
                    remaining = total - index - 1,
                    "Statement failed, halting deployment"
                );
                state.statement_states[index] = StatementState::Failed;
                state.outcomes.push(outcome);
                state.failed = true;
                break;
            }
        }

        Ok(())
    }

    /// Rewrites, normalizes, and sends one statement through the primitive
    /// its category calls for.
    async fn dispatch(
        &self,
        statement: &ClassifiedStatement,
        method: QueryTagMethod,
        request: &DeployRequest,
        identity: &Identity,
        log: &mut DeploymentLog,
    ) -> ExecutionOutcome {
        let category = statement.category;
        let preview = prepare::preview(statement.text());

        let mut sql = statement.text().to_string();
        if method.rewrites_statements() {
            if category.is_routine_definition() {
                log.detail(
                    "Note",
                    format!("Query tag comment skipped for {category} to preserve $$ delimiters"),
                );
            } else {
                let comment = tagging::tag_comment(
                    &request.query_tag,
                    &identity.user,
                    &identity.role,
                    &event_timestamp(Local::now()),
                );
                sql = prepare::with_tag_comment(&comment, &sql);
            }
        }
        let sql = prepare::normalize_trailing_semicolon(&sql);

        debug!(ordinal = statement.ordinal(), %category, sql = %sql, "Dispatching statement");

        let result = if category.uses_definition_primitive() {
            self.target
                .execute_definition(&sql)
                .await
                .map(|()| EXECUTED_SUCCESSFULLY.to_string())
                .map_err(|e| {
                    let message = e.message();
                    if category.is_routine_definition() && prepare::is_parse_failure(&message) {
                        prepare::routine_parse_failure(&message)
                    } else {
                        message
                    }
                })
        } else {
            self.target
                .execute_query(&sql)
                .await
                .map(|result| summarize(&result))
                .map_err(|e| e.message())
        };

        let result = match result {
            Ok(summary) => {
                info!(ordinal = statement.ordinal(), %category, "{}", summary);
                log.event(format!("✓ {category}: {summary}"));
                log.detail("SQL", &preview);
                DispatchResult::Succeeded { summary }
            }
            Err(error) => {
                error!(ordinal = statement.ordinal(), %category, "Statement failed: {}", error);
                log.event(format!("✗ {category}: FAILED"));
                log.detail("SQL", &preview);
                log.detail("Error", &error);
                DispatchResult::Failed {
                    hints: prepare::failure_hints(&sql),
                    error,
                }
            }
        };

        ExecutionOutcome {
            ordinal: statement.ordinal(),
            category,
            sql_sent: sql,
            result,
        }
    }
}

/// Downgrades an engine's "unsupported here" answer to a skipped switch.
fn tolerate_unsupported(result: Result<ContextSwitch>) -> Result<ContextSwitch> {
    match result {
        Err(e) if e.is_unsupported() => Ok(ContextSwitch::skipped(e.message())),
        other => other,
    }
}

fn record_context(state: &mut RunState, label: &str, name: &str, switch: ContextSwitch) {
    match switch {
        ContextSwitch::Applied => {
            info!("{} set: {}", label, name);
            state.log.event(format!("{label} set: {name}"));
        }
        ContextSwitch::Skipped { note } => {
            warn!(
                "{} context not switched ({}); statements need fully qualified names",
                label, note
            );
            state
                .log
                .event(format!("{label} context: {name} (note: {note})"));
            state.notes.push(note);
        }
    }
}

fn summarize(result: &QueryResult) -> String {
    if result.is_empty() {
        EXECUTED_SUCCESSFULLY.to_string()
    } else {
        format!("{} row(s) returned/affected", result.row_count)
    }
}
