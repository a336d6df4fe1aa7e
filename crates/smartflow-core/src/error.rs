//! Error types for `smartflow-core`.

use thiserror::Error;

use crate::lifecycle::{ActionKind, Stage};

#[derive(Debug, Error)]
pub enum Error {
  #[error("risk score {0} is outside [0, 1]")]
  RiskOutOfRange(f64),

  #[error("unknown request status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown update type: {0:?}")]
  UnknownUpdateType(String),

  #[error("server reported auto-approval for a {bucket} risk request")]
  ForbiddenAutoApproval { bucket: &'static str },

  #[error("cannot {action} a request in stage {stage}")]
  IllegalTransition { action: ActionKind, stage: Stage },

  #[error("a rejection requires a non-empty reason")]
  MissingReason,

  #[error("an information request requires a non-empty comment")]
  MissingComment,

  #[error("invalid credentials: {0}")]
  InvalidCredentials(&'static str),

  #[error("notification not found: {0}")]
  NotificationNotFound(u64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
