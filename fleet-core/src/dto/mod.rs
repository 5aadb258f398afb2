//! Data Transfer Objects for coordinator communication
//!
//! Request and response bodies exchanged between a bot and the coordinator.
//! Shapes follow the coordinator's JSON contract field for field.

pub mod bot;
pub mod job;
