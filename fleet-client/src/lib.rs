//! Fleet Coordinator Client
//!
//! A small, typed HTTP client for the fleet coordinator API.
//!
//! The bot uses it to register, send heartbeats, claim jobs and report job
//! outcomes. Registration yields an access token which is attached as a
//! bearer token to every later request.
//!
//! # Example
//!
//! ```no_run
//! use fleet_client::CoordinatorClient;
//! use fleet_core::dto::job::ClaimRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CoordinatorClient::new("http://localhost:8000/v1");
//!
//!     let jobs = client.claim(&ClaimRequest {
//!         bot_id: "bot_123".to_string(),
//!         operations: vec!["sum".to_string()],
//!         limit: 5,
//!     }).await?;
//!
//!     println!("Claimed {} job(s)", jobs.len());
//!     Ok(())
//! }
//! ```

mod bots;
pub mod error;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// HTTP client for the fleet coordinator API
///
/// Cloning is cheap; clones share the HTTP connection pool and the access
/// token.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    /// Base URL of the coordinator (e.g., "http://localhost:8000/v1")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Bearer token issued at registration
    token: Arc<RwLock<Option<String>>>,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    ///
    /// # Example
    /// ```
    /// use fleet_client::CoordinatorClient;
    ///
    /// let client = CoordinatorClient::new("http://localhost:8000/v1");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new coordinator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use fleet_client::CoordinatorClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = CoordinatorClient::with_client("http://localhost:8000/v1", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get the base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token used for subsequent requests
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Whether a bearer token is currently held
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Attach the bearer token, if any
    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an acknowledgement that may or may not carry a JSON body
    ///
    /// An empty body is returned as `Value::Null`.
    async fn handle_ack(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CoordinatorClient::new("http://localhost:8000/v1");
        assert_eq!(client.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = CoordinatorClient::new("http://localhost:8000/v1/");
        assert_eq!(client.base_url(), "http://localhost:8000/v1");
    }

    #[tokio::test]
    async fn test_token_is_shared_between_clones() {
        let client = CoordinatorClient::new("http://localhost:8000/v1");
        let clone = client.clone();
        assert!(!clone.has_token().await);

        client.set_token(Some("token_xyz".to_string())).await;
        assert!(clone.has_token().await);
    }
}
