//! Bot DTOs
//!
//! Registration and heartbeat bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::job::Assignment;

/// Request to register a bot with the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBot {
    pub bot_key: String,
    pub instance_id: String,
    pub version: String,

    /// Operations this bot can execute
    pub capabilities: Vec<String>,

    pub resources: Resources,

    #[serde(default)]
    pub constraints: Map<String, Value>,

    /// Free-form metadata; always carries `hostname` and `os`
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// Resources a bot offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_cores: u32,
    pub mem_mb: u64,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            cpu_cores: 2,
            mem_mb: 1024,
        }
    }
}

/// Coordinator response to a registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub bot_id: String,
    pub auth: AuthTokens,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    /// Coordinator-side configuration hints, not interpreted by the bot
    #[serde(default)]
    pub config: Option<Value>,
}

/// Credentials issued at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Periodic liveness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub instance_id: String,
    #[serde(default)]
    pub running: Vec<RunningJob>,
    #[serde(default)]
    pub metrics: BotMetrics,
}

/// A job currently executing on the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningJob {
    pub job_id: String,
    pub op: String,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_until: Option<String>,
}

/// Coarse resource usage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BotMetrics {
    /// Fraction of one core, 0.0..=1.0
    pub cpu: f64,
    pub mem_mb: u64,
}

/// Coordinator response to a heartbeat
///
/// An `assignment` is present only when the coordinator changed it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub assignment: Option<Assignment>,
}
