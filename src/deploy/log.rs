//! The persisted deployment log.

use super::DeploymentRun;
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

const BANNER_WIDTH: usize = 60;

/// Format of the bracketed timestamp on each event line.
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format of the Start and End header lines.
const HEADER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a timestamp the way event lines and tag comments carry it.
pub(crate) fn event_timestamp(at: DateTime<Local>) -> String {
    at.format(EVENT_TIME_FORMAT).to_string()
}

/// Ordered log lines for a run.
///
/// Events carry a bracketed timestamp; detail lines (`SQL`, `Error`,
/// `Note`) are indented under the event they belong to and carry none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeploymentLog {
    entries: Vec<String>,
}

impl DeploymentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a timestamped event line.
    pub fn event(&mut self, message: impl AsRef<str>) {
        self.event_at(Local::now(), message);
    }

    pub(crate) fn event_at(&mut self, at: DateTime<Local>, message: impl AsRef<str>) {
        self.entries
            .push(format!("[{}] {}", event_timestamp(at), message.as_ref()));
    }

    /// Appends an indented detail line such as `   SQL: ...`.
    pub fn detail(&mut self, label: &str, text: impl AsRef<str>) {
        self.entries.push(format!("   {label}: {}", text.as_ref()));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|entry| entry.contains(needle))
    }
}

impl DeploymentRun {
    /// Renders the plain-text log: header block, then the entries verbatim.
    pub fn render(&self) -> String {
        let banner = "=".repeat(BANNER_WIDTH);
        let schema_line = self
            .schema
            .as_deref()
            .map(|schema| format!("Schema: {schema}\n"))
            .unwrap_or_default();

        let header = format!(
            "{banner}\nSQL DEPLOYMENT LOG\n{banner}\n\
             Query Tag: {}\n\
             User: {}\n\
             Role: {}\n\
             Database: {}\n\
             {schema_line}\
             Start: {}\n\
             End: {}\n\
             Status: {}\n\
             {banner}\n",
            self.query_tag,
            self.user,
            self.role,
            self.database,
            self.started_at.format(HEADER_TIME_FORMAT),
            self.finished_at.format(HEADER_TIME_FORMAT),
            self.status,
        );

        header + &self.entries.entries().join("\n")
    }

    /// `deployment_<YYYYMMDD_HHMMSS>.txt`, from the run's start time.
    pub fn file_name(&self) -> String {
        format!("deployment_{}.txt", self.started_at.format("%Y%m%d_%H%M%S"))
    }

    /// Writes the rendered log into `dir` and returns the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}
