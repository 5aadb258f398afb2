//! Bots repository
//!
//! Handles communication with the coordinator for bot-related operations:
//! - Registering the bot and its capabilities
//! - Sending heartbeats to keep the bot lease alive

use anyhow::{Context, Result};
use async_trait::async_trait;
use fleet_client::CoordinatorClient;
use fleet_core::dto::bot::{Heartbeat, HeartbeatResponse, RegisterBot, RegisterResponse};

/// Repository trait for bot-related operations with the coordinator
#[async_trait]
pub trait BotRepository: Send + Sync {
    /// Registers this bot with the coordinator
    ///
    /// Called once at startup; the response carries the bot id and the
    /// initial assignment.
    async fn register(&self, request: &RegisterBot) -> Result<RegisterResponse>;

    /// Sends a heartbeat to the coordinator
    ///
    /// Should be called periodically, well inside the bot lease TTL.
    async fn heartbeat(&self, bot_id: &str, heartbeat: &Heartbeat) -> Result<HeartbeatResponse>;
}

/// HTTP implementation of BotRepository
pub struct HttpBotRepository {
    client: CoordinatorClient,
}

impl HttpBotRepository {
    /// Creates a new HTTP bot repository
    pub fn new(client: CoordinatorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BotRepository for HttpBotRepository {
    async fn register(&self, request: &RegisterBot) -> Result<RegisterResponse> {
        self.client
            .register(request)
            .await
            .context("Failed to register bot")
    }

    async fn heartbeat(&self, bot_id: &str, heartbeat: &Heartbeat) -> Result<HeartbeatResponse> {
        self.client
            .heartbeat(bot_id, heartbeat)
            .await
            .context("Failed to send heartbeat")
    }
}
