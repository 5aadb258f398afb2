//! Core domain types
//!
//! These types describe the work a bot claims from the coordinator and the
//! outcomes it reports back. They are shared between the HTTP client (wire
//! format) and the bot (execution and outbox persistence).

pub mod bot;
pub mod job;
pub mod report;
