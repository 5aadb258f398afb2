//! Scheduler layer for the bot
//!
//! This layer runs the polling cycle ("tick"): flush undelivered reports,
//! claim a batch of jobs, execute them under the concurrency limit, and
//! route every outcome to the coordinator or, failing that, the outbox.

mod running;
mod tick;

pub use tick::{Scheduler, TickReport};
