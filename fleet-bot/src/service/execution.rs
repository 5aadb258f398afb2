//! Execution service
//!
//! Thin dispatch layer between the scheduler and the handlers:
//! - Resolves the job's handler in the registry
//! - Runs it in its own task so a panic cannot take the scheduler down
//! - Returns the handler's result or error unchanged
//!
//! The scheduler relies on errors coming back untouched to tell "the job
//! failed" apart from "the outcome could not be reported".

use async_trait::async_trait;
use fleet_core::domain::job::Job;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

use crate::handlers::{JobError, JobRegistry};

/// Service trait for executing claimed jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Operations this service can execute, advertised when claiming
    fn supported_operations(&self) -> Vec<String>;

    /// Executes a job
    ///
    /// # Returns
    /// The handler's result value, or the error that prevented one
    async fn run(&self, job: &Job) -> Result<Value, JobError>;
}

/// Execution service backed by a [`JobRegistry`]
pub struct RegistryExecutionService {
    registry: Arc<JobRegistry>,
}

impl RegistryExecutionService {
    /// Creates a new execution service over a populated registry
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ExecutionService for RegistryExecutionService {
    fn supported_operations(&self) -> Vec<String> {
        self.registry.operations()
    }

    async fn run(&self, job: &Job) -> Result<Value, JobError> {
        let handler = self.registry.resolve(&job.op)?;
        let payload = job.payload.clone();

        debug!("Running job {} with handler for op={}", job.id, job.op);

        let task = tokio::spawn(async move { handler.execute(&payload).await });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(JobError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(JobError::Handler(anyhow::anyhow!(
                "handler task for job {} was cancelled: {}",
                job.id,
                e
            ))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
