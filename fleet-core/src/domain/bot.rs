//! Bot identity
//!
//! Identifies one running instance of the worker agent to the coordinator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent identity of a bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Stable machine fingerprint, survives restarts and instance rotation
    pub bot_key: String,

    /// Identifies the current process generation of this bot
    pub instance_id: String,

    pub hostname: String,

    pub os: String,
}

impl BotIdentity {
    /// Builds a fresh identity for the given machine description
    ///
    /// The `bot_key` is a name-based UUID over hostname and platform, so the
    /// same machine always yields the same key.
    pub fn generate(hostname: impl Into<String>, os: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let os = os.into();
        Self {
            bot_key: fingerprint(&hostname, &os),
            instance_id: Uuid::new_v4().to_string(),
            hostname,
            os,
        }
    }

    /// Returns a copy with a newly generated instance id
    pub fn rotated(&self) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}

/// Deterministic machine fingerprint
pub fn fingerprint(hostname: &str, os: &str) -> String {
    let name = format!("{}|{}", hostname, os);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
        .simple()
        .to_string()
}
