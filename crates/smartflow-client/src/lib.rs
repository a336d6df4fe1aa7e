//! Client for the SmartFlow update-request portal.
//!
//! [`ApiClient`] wraps the JSON API behind an explicit [`SessionContext`].
//! Stages and risk buckets are never stored; callers resolve them from the
//! fetched data with [`smartflow_core`].

pub mod client;
pub mod error;
pub mod inflight;
pub mod session;

pub use client::{ApiClient, ClientConfig, Document, SubmissionReceipt, UploadPolicy};
pub use error::{Error, Result};
pub use session::SessionContext;

#[cfg(test)]
mod tests;
