//! Report domain types
//!
//! A report tells the coordinator how a claimed job ended. Reports that
//! cannot be delivered are persisted as [`ReportItem`]s in the bot's outbox,
//! one JSON object per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal outcome of a job as seen by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    /// The handler returned a result
    Complete,

    /// The handler failed or no handler exists for the operation
    Failed,
}

impl ReportAction {
    /// Wire name, also used as the last path segment of the report endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportAction::Complete => "complete",
            ReportAction::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReportAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A report awaiting delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    pub job_id: String,
    pub action: ReportAction,
    pub payload: Value,
}

impl ReportItem {
    pub fn new(job_id: impl Into<String>, action: ReportAction, payload: Value) -> Self {
        Self {
            job_id: job_id.into(),
            action,
            payload,
        }
    }
}
