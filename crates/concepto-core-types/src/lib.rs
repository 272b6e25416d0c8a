//! Core types shared across Concepto facilities
//!
//! This crate provides foundational types used by the error and logging
//! facilities of the compiler:
//!
//! - **Correlation types**: RunId, RunContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{RunContext, RunId};
