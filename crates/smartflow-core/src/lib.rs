//! Core types and the update-request state machine for SmartFlow.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! client, the storage backend, and the reference API all depend on it, so
//! risk thresholds and stage transitions are defined exactly once.

pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod request;
pub mod risk;
pub mod session;
pub mod store;
mod timestamp;

pub use error::{Error, Result};
