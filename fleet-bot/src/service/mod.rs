//! Service layer
//!
//! Services hold the bot's business logic below the scheduler: running
//! handlers, bounding concurrency, and buffering undelivered reports.
//!
//! Execution and outbox are trait-based to enable testing and dependency
//! injection.

mod execution;
mod limiter;
mod outbox;

// Re-export traits
pub use execution::ExecutionService;
pub use outbox::OutboxService;

// Re-export implementations
pub use execution::RegistryExecutionService;
pub use limiter::ConcurrencyLimiter;
pub use outbox::FileOutbox;
