//! Mock deployment target for testing and dry runs.
//!
//! Records every call in order and can be scripted to fail individual
//! statements, decline context switches, or reject query-tag strategies.

use super::{escape_literal, ColumnInfo, ContextSwitch, DeployTarget, QueryResult};
use crate::error::{DeployError, Result};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Definition(String),
    Query(String),
    SetDatabase(String),
    SetSchema(String),
    SessionTag(String),
}

/// Scripted response to a context switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MockContext {
    #[default]
    Apply,
    /// Return [`ContextSwitch::Skipped`] with this note.
    Skip(String),
    /// Return [`DeployError::Unsupported`] with this message.
    Unsupported(String),
    /// Return a hard [`DeployError::Query`] with this message.
    Fail(String),
}

/// A mock target that accepts everything unless told otherwise.
#[derive(Debug)]
pub struct MockTarget {
    calls: Mutex<Vec<MockCall>>,
    failures: Vec<(String, String)>,
    database: MockContext,
    schema: MockContext,
    session_handle: bool,
    reject_tag_statement: bool,
    tag_statement_limit: Option<usize>,
    user: Option<String>,
    role: Option<String>,
}

impl MockTarget {
    /// Creates a mock with a session handle, user `MOCK_USER` and role `MOCK_ROLE`.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Vec::new(),
            database: MockContext::Apply,
            schema: MockContext::Apply,
            session_handle: true,
            reject_tag_statement: false,
            tag_statement_limit: None,
            user: Some("MOCK_USER".to_string()),
            role: Some("MOCK_ROLE".to_string()),
        }
    }

    /// Fails any statement whose text contains `pattern` with `error`.
    pub fn fail_on(mut self, pattern: impl Into<String>, error: impl Into<String>) -> Self {
        self.failures.push((pattern.into(), error.into()));
        self
    }

    /// Scripts the response to `set_database_context`.
    pub fn with_database_context(mut self, behaviour: MockContext) -> Self {
        self.database = behaviour;
        self
    }

    /// Scripts the response to `set_schema_context`.
    pub fn with_schema_context(mut self, behaviour: MockContext) -> Self {
        self.schema = behaviour;
        self
    }

    /// Drops the native session handle, so session tags are unsupported.
    pub fn without_session_handle(mut self) -> Self {
        self.session_handle = false;
        self
    }

    /// Rejects the session-scoped query tag statement.
    pub fn rejecting_tag_statement(mut self) -> Self {
        self.reject_tag_statement = true;
        self
    }

    /// Refuses to build a tag statement for tags longer than `bytes`.
    pub fn with_tag_statement_limit(mut self, bytes: usize) -> Self {
        self.tag_statement_limit = Some(bytes);
        self
    }

    /// Makes the user and role lookups fail.
    pub fn without_identity(mut self) -> Self {
        self.user = None;
        self.role = None;
        self
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock_calls().clone()
    }

    /// Returns the SQL sent to either execution primitive, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.lock_calls()
            .iter()
            .filter_map(|call| match call {
                MockCall::Definition(sql) | MockCall::Query(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: MockCall) {
        self.lock_calls().push(call);
    }

    fn scripted_failure(&self, sql: &str) -> Result<()> {
        match self.failures.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            Some((_, error)) => Err(DeployError::query(error.clone())),
            None => Ok(()),
        }
    }

    fn switch(behaviour: &MockContext) -> Result<ContextSwitch> {
        match behaviour {
            MockContext::Apply => Ok(ContextSwitch::Applied),
            MockContext::Skip(note) => Ok(ContextSwitch::skipped(note.clone())),
            MockContext::Unsupported(msg) => Err(DeployError::unsupported(msg.clone())),
            MockContext::Fail(msg) => Err(DeployError::query(msg.clone())),
        }
    }
}

impl Default for MockTarget {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips one leading `/* ... */` comment so tagged statements are
/// recognised by their first keyword.
fn leading_keyword_text(sql: &str) -> &str {
    let trimmed = sql.trim_start();
    match trimmed.strip_prefix("/*").and_then(|rest| rest.find("*/").map(|end| &rest[end + 2..])) {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

#[async_trait]
impl DeployTarget for MockTarget {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute_definition(&self, sql: &str) -> Result<()> {
        self.record(MockCall::Definition(sql.to_string()));
        self.scripted_failure(sql)
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.record(MockCall::Query(sql.to_string()));
        if self.reject_tag_statement && sql.starts_with("ALTER SESSION SET QUERY_TAG") {
            return Err(DeployError::query("QUERY_TAG cannot be set in this session"));
        }
        self.scripted_failure(sql)?;

        let upper = leading_keyword_text(sql).to_uppercase();
        let result = if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            QueryResult::with_rows(vec![ColumnInfo::new("result", "text")], 1)
        } else {
            QueryResult::new()
        };
        Ok(result.with_execution_time(Duration::from_millis(1)))
    }

    async fn set_database_context(&self, name: &str) -> Result<ContextSwitch> {
        self.record(MockCall::SetDatabase(name.to_string()));
        Self::switch(&self.database)
    }

    async fn set_schema_context(&self, name: &str) -> Result<ContextSwitch> {
        self.record(MockCall::SetSchema(name.to_string()));
        Self::switch(&self.schema)
    }

    async fn set_session_query_tag(&self, tag: &str) -> Result<()> {
        if !self.session_handle {
            return Err(DeployError::unsupported("mock has no session handle"));
        }
        self.record(MockCall::SessionTag(tag.to_string()));
        Ok(())
    }

    fn query_tag_statement(&self, tag: &str) -> Result<String> {
        if let Some(limit) = self.tag_statement_limit.filter(|limit| tag.len() > *limit) {
            return Err(DeployError::unsupported(format!(
                "session tag holds at most {limit} bytes"
            )));
        }
        Ok(format!(
            "ALTER SESSION SET QUERY_TAG = '{}'",
            escape_literal(tag)
        ))
    }

    async fn current_user(&self) -> Result<String> {
        self.user
            .clone()
            .ok_or_else(|| DeployError::query("CURRENT_USER is unavailable"))
    }

    async fn current_role(&self) -> Result<String> {
        self.role
            .clone()
            .ok_or_else(|| DeployError::query("CURRENT_ROLE is unavailable"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
