//! Database abstraction layer for sql-deploy.
//!
//! The orchestrator never talks to a driver directly. It drives a
//! [`DeployTarget`], which exposes the two execution primitives, context
//! switching, and the session identity lookups used for the deployment log.

mod mock;
mod postgres;
mod types;

pub use mock::{MockCall, MockContext, MockTarget};
pub use postgres::PostgresTarget;
pub use types::{ColumnInfo, ContextSwitch, QueryResult};

use crate::config::ConnectionConfig;
use crate::error::{DeployError, Result};
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
        }
    }
}

/// Creates a deployment target for the given configuration.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DeployTarget>> {
    match config.backend {
        DatabaseBackend::Postgres => {
            let target = PostgresTarget::connect(config).await?;
            Ok(Box::new(target))
        }
    }
}

/// Escapes a value for use inside a single-quoted SQL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Quotes an identifier with double quotes, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The engine a deployment runs against.
///
/// Every call is awaited to completion before the next one starts; targets
/// own their own timeouts and connection retries.
#[async_trait]
pub trait DeployTarget: Send + Sync {
    /// Human-readable engine name for the deployment log.
    fn name(&self) -> &str;

    /// Executes a statement that returns no rows (DDL, grants, session and
    /// transaction control). Dollar-quoted bodies must reach the engine
    /// unmodified.
    async fn execute_definition(&self, sql: &str) -> Result<()>;

    /// Executes a statement that returns (or affects) rows.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Makes `name` the active database.
    ///
    /// Returns [`ContextSwitch::Skipped`] or [`DeployError::Unsupported`]
    /// when the engine cannot switch in its current mode.
    async fn set_database_context(&self, name: &str) -> Result<ContextSwitch>;

    /// Makes `name` the active schema. Same contract as
    /// [`DeployTarget::set_database_context`].
    async fn set_schema_context(&self, name: &str) -> Result<ContextSwitch>;

    /// Sets the query tag on a native session handle, when the target has one.
    async fn set_session_query_tag(&self, _tag: &str) -> Result<()> {
        Err(DeployError::unsupported(format!(
            "{} has no native session handle for query tags",
            self.name()
        )))
    }

    /// Builds the session-scoped statement that sets the query tag.
    ///
    /// Returns [`DeployError::Unsupported`] when the session setting could
    /// not hold `tag` verbatim.
    fn query_tag_statement(&self, tag: &str) -> Result<String> {
        Ok(format!(
            "ALTER SESSION SET QUERY_TAG = '{}'",
            escape_literal(tag)
        ))
    }

    /// Returns the user the session is authenticated as.
    async fn current_user(&self) -> Result<String>;

    /// Returns the role the session acts under.
    async fn current_role(&self) -> Result<String>;

    /// Closes the underlying connection.
    async fn close(&self) -> Result<()>;
}
