//! Client SDK for the generation studio backend.
//!
//! [`api`] wraps the HTTP endpoints (jobs, uploads, transactions, credits, API keys).
//! [`sync::JobStore`] keeps one deduplicated, self-refreshing view of the user's jobs that
//! blends server pages with optimistic submissions, and [`generation::Submitter`] drives
//! submissions through it.

pub mod api;
pub mod commands;
pub mod config;
pub mod errors;
pub mod generation;
pub mod sync;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use api::ApiClient;
pub use errors::{Error, Result};
pub use sync::JobStore;
