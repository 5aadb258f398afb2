//! Job DTOs for claiming work

use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Request to claim a batch of jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Coordinator-assigned bot id (from registration)
    pub bot_id: String,

    /// Operations this bot can execute
    pub operations: Vec<String>,

    /// Maximum number of jobs to hand out
    pub limit: usize,
}

/// Claimed jobs; the coordinator may omit `jobs` when there is nothing to do
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}
