use std::collections::HashMap;
use std::sync::Arc;

use super::{JobError, JobHandler};

/// Maps operation names to handlers
///
/// Built during startup (see [`super::register_builtin`]) and then shared
/// read-only. Tests build their own instance instead of touching the one the
/// bot runs with.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in handlers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        super::register_builtin(&mut registry);
        registry
    }

    /// Installs a handler, replacing any previous one for the same name
    ///
    /// # Returns
    /// The handler that was replaced, if any
    pub fn register<H: JobHandler + 'static>(
        &mut self,
        operation: impl Into<String>,
        handler: H,
    ) -> Option<Arc<dyn JobHandler>> {
        self.handlers.insert(operation.into(), Arc::new(handler))
    }

    /// Looks up the handler for an operation
    pub fn resolve(&self, operation: &str) -> Result<Arc<dyn JobHandler>, JobError> {
        self.handlers
            .get(operation)
            .cloned()
            .ok_or_else(|| JobError::UnknownOperation(operation.to_string()))
    }

    /// Registered operation names, sorted
    pub fn operations(&self) -> Vec<String> {
        let mut operations: Vec<String> = self.handlers.keys().cloned().collect();
        operations.sort();
        operations
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("operations", &self.operations())
            .finish()
    }
}
