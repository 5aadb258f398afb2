//! Job domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of work claimed from the coordinator
///
/// Created by the coordinator at claim time. The bot holds it only for the
/// duration of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque, coordinator-assigned identifier
    pub id: String,

    /// Operation name, selects the handler
    pub op: String,

    /// Handler-defined input data
    #[serde(default = "empty_payload")]
    pub payload: Value,

    /// Lease expiry assigned by the coordinator, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_until: Option<String>,
}

impl Job {
    /// Creates a job without lease metadata
    pub fn new(id: impl Into<String>, op: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            op: op.into(),
            payload,
            lease_until: None,
        }
    }
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

/// Operations and concurrency the coordinator assigns to a bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Operations this bot may claim; empty means "whatever it can run"
    #[serde(default)]
    pub operations: Vec<String>,

    /// Maximum number of jobs executing at once
    pub max_concurrency: usize,

    /// A paused bot keeps heartbeating but claims nothing
    #[serde(default)]
    pub paused: bool,
}

impl Assignment {
    /// Creates an unpaused assignment that does not restrict operations
    pub fn unrestricted(max_concurrency: usize) -> Self {
        Self {
            operations: Vec::new(),
            max_concurrency,
            paused: false,
        }
    }
}
