//! Job-related API endpoints

use crate::CoordinatorClient;
use crate::error::Result;
use fleet_core::domain::job::Job;
use fleet_core::domain::report::ReportAction;
use fleet_core::dto::job::{ClaimRequest, ClaimResponse};
use serde_json::Value;

impl CoordinatorClient {
    // =============================================================================
    // Job Claiming
    // =============================================================================

    /// Claim up to `req.limit` jobs for the given operations
    ///
    /// # Returns
    /// The claimed jobs, possibly none
    pub async fn claim(&self, req: &ClaimRequest) -> Result<Vec<Job>> {
        let url = format!("{}/jobs/claim", self.base_url);
        let request = self.authorize(self.client.post(&url).json(req)).await;
        let response = request.send().await?;

        let claimed: ClaimResponse = self.handle_response(response).await?;
        tracing::debug!("Claimed {} job(s) for bot {}", claimed.jobs.len(), req.bot_id);
        Ok(claimed.jobs)
    }

    // =============================================================================
    // Job Reporting
    // =============================================================================

    /// Report the outcome of a job
    ///
    /// # Arguments
    /// * `job_id` - The job being reported
    /// * `action` - `complete` or `failed`
    /// * `payload` - Result or error body
    ///
    /// # Returns
    /// The coordinator's acknowledgement body (`Null` when empty)
    pub async fn report(&self, job_id: &str, action: ReportAction, payload: &Value) -> Result<Value> {
        let url = format!("{}/jobs/{}/{}", self.base_url, job_id, action.as_str());
        let request = self.authorize(self.client.post(&url).json(payload)).await;
        let response = request.send().await?;

        self.handle_ack(response).await
    }
}
