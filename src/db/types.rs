//! Result types returned by deployment targets.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tabular outcome of the query primitive.
///
/// Only the shape is kept; deployment logs report row counts, not values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows returned, or rows affected for DML without a result set.
    pub row_count: usize,

    /// Time taken to execute the statement.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and row count.
    pub fn with_rows(columns: Vec<ColumnInfo>, row_count: usize) -> Self {
        Self {
            columns,
            row_count,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if no rows came back or were touched.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// How a database or schema context request was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextSwitch {
    /// The session now uses the requested context.
    Applied,
    /// The engine could not switch in its current mode. Statements must use
    /// fully qualified names.
    Skipped { note: String },
}

impl ContextSwitch {
    /// Creates a skipped switch with an explanatory note.
    pub fn skipped(note: impl Into<String>) -> Self {
        Self::Skipped { note: note.into() }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
