//! Command orchestration layer.
//!
//! Provides high-level command functions that coordinate between
//! core compilation logic and the persistence layer.

pub mod cache_admin;
pub mod compile;
pub mod engine_command;
