//! Error types for `smartflow-client`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The connection failed or timed out.
  #[error("network error: {0}")]
  Transport(#[from] reqwest::Error),

  /// The server answered with a body that is not the expected JSON.
  #[error("unreadable response (HTTP {status}): {detail}")]
  MalformedResponse { status: u16, detail: String },

  /// No session exists; nothing was sent.
  #[error("not logged in")]
  NotLoggedIn,

  /// The server refused the token. The local session has been cleared.
  #[error("session expired, please log in again")]
  Unauthenticated,

  /// The server rejected the call with a 4xx or 5xx status.
  #[error("{message}")]
  Rejected { status: u16, message: String },

  /// A local precondition failed before any request was issued, or the
  /// server reported data that breaks the lifecycle contract.
  #[error(transparent)]
  Core(#[from] smartflow_core::Error),

  #[error("session storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

  #[error("{action} for {key} is already in flight")]
  AlreadyInFlight { action: &'static str, key: String },

  /// Raised under [`UploadPolicy::AllOrNothing`](crate::UploadPolicy); the
  /// submission was not sent.
  #[error("{} document upload(s) failed: {}", failed.len(), failed.join(", "))]
  UploadsFailed { failed: Vec<String> },

  #[error("could not read {path}: {source}")]
  ReadDocument {
    path:   String,
    #[source]
    source: std::io::Error,
  },
}

impl Error {
  pub(crate) fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  /// Transport failures and unparseable bodies.
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Transport(_) | Self::MalformedResponse { .. })
  }

  /// Missing or rejected session.
  pub fn is_auth(&self) -> bool { matches!(self, Self::NotLoggedIn | Self::Unauthenticated) }

  /// Payload rejected by the server or by a local pre-check.
  pub fn is_validation(&self) -> bool {
    match self {
      Self::Rejected { status, .. } => (400..500).contains(status),
      Self::Core(_) => true,
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
