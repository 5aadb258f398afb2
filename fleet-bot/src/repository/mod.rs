//! Repository layer
//!
//! Repositories are stateless adapters over the coordinator API. They give
//! the scheduler and the bot lifecycle small, focused interfaces without any
//! business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod bots;
mod jobs;

// Re-export traits
pub use bots::BotRepository;
pub use jobs::JobRepository;

// Re-export implementations
pub use bots::HttpBotRepository;
pub use jobs::HttpJobRepository;
