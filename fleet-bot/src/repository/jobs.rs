//! Jobs repository
//!
//! Handles communication with the coordinator for job-related operations:
//! - Claiming batches of jobs
//! - Reporting job outcomes

use anyhow::{Context, Result};
use async_trait::async_trait;
use fleet_client::CoordinatorClient;
use fleet_core::domain::job::Job;
use fleet_core::domain::report::ReportAction;
use fleet_core::dto::job::ClaimRequest;
use serde_json::Value;

/// Repository trait for job-related operations with the coordinator
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Claims up to `limit` jobs for the given operations
    ///
    /// An empty result is normal: there is nothing to do this cycle.
    ///
    /// # Arguments
    /// * `bot_id` - Coordinator-assigned bot id
    /// * `operations` - Operations this bot can execute
    /// * `limit` - Batch size
    async fn claim(&self, bot_id: &str, operations: &[String], limit: usize) -> Result<Vec<Job>>;

    /// Reports a job outcome
    ///
    /// # Arguments
    /// * `job_id` - The job being reported
    /// * `action` - `complete` or `failed`
    /// * `payload` - Result or error body
    async fn report(&self, job_id: &str, action: ReportAction, payload: &Value) -> Result<()>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: CoordinatorClient,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    ///
    /// # Arguments
    /// * `client` - Coordinator client, shared with the bot repository so
    ///   both use the registration token
    pub fn new(client: CoordinatorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn claim(&self, bot_id: &str, operations: &[String], limit: usize) -> Result<Vec<Job>> {
        let request = ClaimRequest {
            bot_id: bot_id.to_string(),
            operations: operations.to_vec(),
            limit,
        };

        self.client
            .claim(&request)
            .await
            .context("Failed to claim jobs")
    }

    async fn report(&self, job_id: &str, action: ReportAction, payload: &Value) -> Result<()> {
        self.client
            .report(job_id, action, payload)
            .await
            .with_context(|| format!("Failed to report {} for job {}", action, job_id))?;

        Ok(())
    }
}
