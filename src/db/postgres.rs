//! PostgreSQL deployment target.
//!
//! Provides the `PostgresTarget` struct that implements the `DeployTarget`
//! trait for PostgreSQL databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{
    escape_literal, quote_identifier, ColumnInfo, ContextSwitch, DeployTarget, QueryResult,
};
use crate::error::{DeployError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Either, Executor, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Statement timeout in seconds.
const STATEMENT_TIMEOUT_SECS: u64 = 300;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Longest `application_name` Postgres stores without truncating (NAMEDATALEN - 1).
const MAX_APPLICATION_NAME_BYTES: usize = 63;

/// PostgreSQL deployment target.
///
/// Holds exactly one pooled connection so `search_path` and
/// `application_name` stick for the whole run.
#[derive(Debug)]
pub struct PostgresTarget {
    pool: PgPool,
}

impl PostgresTarget {
    /// Connects with retries on transient failures.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to database");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, config)),
            None => Err(DeployError::internal("no connection attempt was made")),
        }
    }

    /// Runs `sql`, collecting returned rows and the rows-affected total
    /// from the command completion.
    async fn fetch_counted(
        &self,
        sql: &str,
    ) -> std::result::Result<(Vec<PgRow>, u64), sqlx::Error> {
        let mut stream = (&self.pool).fetch_many(sqlx::query(sql));
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
        Ok((rows, rows_affected))
    }

    async fn scalar(&self, sql: &str) -> Result<String> {
        sqlx::query_scalar::<_, String>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DeployError::query(format_query_error(e)))
    }
}

#[async_trait]
impl DeployTarget for PostgresTarget {
    fn name(&self) -> &str {
        "PostgreSQL"
    }

    async fn execute_definition(&self, sql: &str) -> Result<()> {
        // raw_sql skips the prepare step, so dollar-quoted bodies go through
        // the simple query protocol untouched.
        tokio::time::timeout(
            Duration::from_secs(STATEMENT_TIMEOUT_SECS),
            sqlx::raw_sql(sql).execute(&self.pool),
        )
        .await
        .map_err(|_| {
            DeployError::query(format!(
                "Statement timed out after {STATEMENT_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| DeployError::query(format_query_error(e)))?;

        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let (rows, rows_affected) = tokio::time::timeout(
            Duration::from_secs(STATEMENT_TIMEOUT_SECS),
            self.fetch_counted(sql),
        )
        .await
        .map_err(|_| {
            DeployError::query(format!(
                "Statement timed out after {STATEMENT_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| DeployError::query(format_query_error(e)))?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();
        let row_count = rows
            .len()
            .max(usize::try_from(rows_affected).unwrap_or(usize::MAX));

        Ok(QueryResult::with_rows(columns, row_count).with_execution_time(start.elapsed()))
    }

    async fn set_database_context(&self, name: &str) -> Result<ContextSwitch> {
        // A Postgres session is bound to one database for its lifetime.
        let current = self.scalar("SELECT current_database()::text").await?;
        if current == name {
            Ok(ContextSwitch::Applied)
        } else {
            Ok(ContextSwitch::skipped(format!(
                "connected to '{current}'; switching databases is not supported on an open connection - using fully qualified names"
            )))
        }
    }

    async fn set_schema_context(&self, name: &str) -> Result<ContextSwitch> {
        let sql = format!("SET search_path TO {}", quote_identifier(name));
        self.execute_definition(&sql).await?;
        Ok(ContextSwitch::Applied)
    }

    fn query_tag_statement(&self, tag: &str) -> Result<String> {
        application_name_statement(tag)
    }

    async fn current_user(&self) -> Result<String> {
        self.scalar("SELECT session_user::text").await
    }

    async fn current_role(&self) -> Result<String> {
        self.scalar("SELECT current_role::text").await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Builds the `SET application_name` statement carrying the query tag.
///
/// Postgres cuts `application_name` at 63 bytes and replaces non-ASCII
/// characters, so such tags are refused rather than stored altered.
fn application_name_statement(tag: &str) -> Result<String> {
    if !tag.is_ascii() {
        return Err(DeployError::unsupported(
            "application_name cannot hold non-ASCII query tags",
        ));
    }
    if tag.len() > MAX_APPLICATION_NAME_BYTES {
        return Err(DeployError::unsupported(format!(
            "application_name holds at most {MAX_APPLICATION_NAME_BYTES} bytes, query tag has {}",
            tag.len()
        )));
    }
    Ok(format!("SET application_name = '{}'", escape_literal(tag)))
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> DeployError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        DeployError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        DeployError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        DeployError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        DeployError::connection(
            "Server requires SSL. Add '?sslmode=require' to connection string.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        DeployError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        DeployError::connection(error.to_string())
    }
}

/// Formats an execution error, keeping Postgres detail and hint lines.
///
/// Deployment logs quote this text verbatim, so position and context are
/// kept as well.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(context) = pg_error.r#where() {
            result.push_str("\n  CONTEXT: ");
            result.push_str(context);
        }
    }

    result
}
