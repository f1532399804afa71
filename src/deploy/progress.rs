//! Progress reporting for a deployment run.
//!
//! Setup phases report fixed milestones; statement dispatch spreads the
//! remaining range up to 90 evenly, and completion always reports 100.

use tracing::debug;

pub(crate) const CONNECTED: u8 = 5;
pub(crate) const DATABASE_SET: u8 = 10;
pub(crate) const SCHEMA_SET: u8 = 15;
pub(crate) const QUERY_TAG_SET: u8 = 20;
pub(crate) const COMPLETE: u8 = 100;

const STATEMENT_RANGE: usize = 70;

/// Receives progress updates from a run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, message: &str);
}

/// Discards progress updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Forwards progress updates to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, percent: u8, message: &str) {
        debug!(percent, "{}", message);
    }
}

/// Percent reported when the `index`-th (1-based) of `total` statements
/// is dispatched.
pub(crate) fn statement_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return QUERY_TAG_SET;
    }
    let share = index.min(total) * STATEMENT_RANGE / total;
    QUERY_TAG_SET + share as u8
}
