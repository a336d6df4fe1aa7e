//! The `SessionStore` trait: durable client storage keyed by fixed names.
//!
//! Implemented by storage backends (e.g. `smartflow-store-sqlite`). The
//! client's session context depends on this abstraction only.

use std::future::Future;

/// The fixed keys a client persists. Logout clears all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
  /// The bearer token.
  AuthToken,
  /// JSON-encoded [`StoredPrincipal`](crate::session::StoredPrincipal).
  Principal,
  /// JSON-encoded last-fetched request list. Raw server data only; stages
  /// and buckets are always recomputed from it.
  RequestCache,
}

impl StorageKey {
  pub const ALL: [StorageKey; 3] =
    [StorageKey::AuthToken, StorageKey::Principal, StorageKey::RequestCache];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::AuthToken => "auth_token",
      Self::Principal => "principal",
      Self::RequestCache => "request_cache",
    }
  }
}

/// Abstraction over a durable key-value store for session data.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded runtimes as well as the CLI's single-threaded one.
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the value stored under `key`, if any.
  fn get(
    &self,
    key: StorageKey,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Store `value` under `key`, replacing any previous value.
  fn put(
    &self,
    key: StorageKey,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove every key in `keys` in one step. Missing keys are not an error.
  fn remove(
    &self,
    keys: &'static [StorageKey],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
