//! Job handlers
//!
//! A handler implements one operation's business logic. Handlers are looked
//! up by operation name in a [`JobRegistry`], which is populated once at
//! startup and then shared read-only.

mod arithmetic;
mod registry;

pub use arithmetic::{SubtractHandler, SumHandler};
pub use registry::JobRegistry;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors produced while executing a job
#[derive(Debug, Error)]
pub enum JobError {
    /// No handler is registered for the job's operation
    #[error("No handler for op={0}")]
    UnknownOperation(String),

    /// The payload is missing fields or has the wrong shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The handler panicked; the panic was contained in its task
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Any other handler failure
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// Business logic for one operation
///
/// Implementations should yield at their own I/O boundaries; the bot runs
/// several handlers concurrently on the same runtime.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Executes the operation against a job payload
    ///
    /// # Returns
    /// The result value reported to the coordinator
    async fn execute(&self, payload: &Value) -> Result<Value, JobError>;
}

/// Adapter turning an async closure into a [`JobHandler`]
#[cfg(test)]
pub struct HandlerFn<F>(F);

/// Wraps an async closure taking the payload by value
///
/// # Example
/// ```ignore
/// registry.register("echo", handler_fn(|payload| async move { Ok(payload) }));
/// ```
#[cfg(test)]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, JobError>> + Send + 'static,
{
    HandlerFn(f)
}

#[cfg(test)]
#[async_trait]
impl<F, Fut> JobHandler for HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, JobError>> + Send + 'static,
{
    async fn execute(&self, payload: &Value) -> Result<Value, JobError> {
        (self.0)(payload.clone()).await
    }
}

/// Registers every handler shipped with the bot
///
/// This is the startup population phase; the registry is frozen behind an
/// `Arc` afterwards.
pub fn register_builtin(registry: &mut JobRegistry) {
    registry.register("sum", SumHandler);
    registry.register("subtract", SubtractHandler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handler_fn_receives_payload() {
        let handler = handler_fn(|payload: Value| async move { Ok(payload["x"].clone()) });

        let result = handler.execute(&json!({"x": 7})).await.unwrap();
        assert_eq!(result, json!(7));
    }

    #[test]
    fn test_builtin_operations() {
        let mut registry = JobRegistry::new();
        register_builtin(&mut registry);

        assert_eq!(
            registry.operations(),
            vec!["subtract".to_string(), "sum".to_string()]
        );
    }

    #[test]
    fn test_handler_error_message_is_preserved() {
        let err = JobError::from(anyhow::anyhow!("Job failed"));
        assert_eq!(err.to_string(), "Job failed");

        let err = JobError::UnknownOperation("unknown_op".to_string());
        assert_eq!(err.to_string(), "No handler for op=unknown_op");
    }
}
