//! Core domain types for the Noshwork marketplace backend.
//!
//! This crate contains:
//! - Job lifecycle types and the typed payload union
//! - Moderation configuration and keyword matching
//! - Cart snapshots and per-seller order records
//! - Payment processor event types
//! - The shared error taxonomy

pub mod error;
pub mod job;
pub mod moderation;
pub mod order;
pub mod payment;

pub use error::{Error, Result};
pub use job::{JobPayload, JobStatus, JobType};
