//! Bot registration and heartbeat endpoints

use crate::CoordinatorClient;
use crate::error::Result;
use fleet_core::dto::bot::{Heartbeat, HeartbeatResponse, RegisterBot, RegisterResponse};

impl CoordinatorClient {
    // =============================================================================
    // Bot Registration & Lifecycle
    // =============================================================================

    /// Register this bot with the coordinator
    ///
    /// On success the issued access token is stored and used for every
    /// subsequent request made through this client (and its clones).
    ///
    /// # Example
    /// ```no_run
    /// # use fleet_client::CoordinatorClient;
    /// # use fleet_core::dto::bot::{RegisterBot, Resources};
    /// # async fn example() -> Result<(), fleet_client::ClientError> {
    /// let client = CoordinatorClient::new("http://localhost:8000/v1");
    /// let registered = client.register(&RegisterBot {
    ///     bot_key: "abc123".to_string(),
    ///     instance_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
    ///     version: "1.0.0".to_string(),
    ///     capabilities: vec!["sum".to_string()],
    ///     resources: Resources::default(),
    ///     constraints: Default::default(),
    ///     meta: Default::default(),
    /// }).await?;
    /// println!("registered as {}", registered.bot_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn register(&self, req: &RegisterBot) -> Result<RegisterResponse> {
        let url = format!("{}/bots/register", self.base_url);
        let request = self.authorize(self.client.post(&url).json(req)).await;
        let response = request.send().await?;

        let registered: RegisterResponse = self.handle_response(response).await?;
        self.set_token(Some(registered.auth.access_token.clone()))
            .await;

        tracing::info!("Registered bot {} ({})", registered.bot_id, req.instance_id);
        Ok(registered)
    }

    /// Send a heartbeat to the coordinator
    ///
    /// Keeps the bot's lease alive and picks up assignment changes.
    ///
    /// # Arguments
    /// * `bot_id` - The coordinator-assigned bot id
    /// * `heartbeat` - Running jobs and metrics
    pub async fn heartbeat(&self, bot_id: &str, heartbeat: &Heartbeat) -> Result<HeartbeatResponse> {
        let url = format!("{}/bots/{}/heartbeat", self.base_url, bot_id);
        let request = self.authorize(self.client.put(&url).json(heartbeat)).await;
        let response = request.send().await?;

        self.handle_response(response).await
    }
}
