//! Fleet Core
//!
//! Core types shared by the fleet worker agent and its coordinator client.
//!
//! This crate contains:
//! - Domain types: jobs, report items, assignments, bot identity
//! - DTOs: request/response bodies exchanged with the coordinator

pub mod domain;
pub mod dto;
