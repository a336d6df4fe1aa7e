//! The explicit session context handed to the client.
//!
//! A [`SessionContext`] owns the storage backend and the in-memory copy of
//! the current [`Session`]. `init` loads it, `establish` replaces it, and
//! `teardown` clears every persisted key. `teardown_if` does the same for a
//! specific token only.

use std::sync::{PoisonError, RwLock};

use smartflow_core::{
  request::UpdateRequest,
  session::{Session, StoredPrincipal},
  store::{SessionStore, StorageKey},
};

use crate::{Error, Result};

pub struct SessionContext<S> {
  store:   S,
  current: RwLock<Option<Session>>,
}

impl<S: SessionStore> SessionContext<S> {
  /// Load the persisted session, if any.
  ///
  /// A token without a readable principal (or the reverse) is not a session;
  /// such leftovers are cleared.
  pub async fn init(store: S) -> Result<Self> {
    let token = store.get(StorageKey::AuthToken).await.map_err(Error::storage)?;
    let principal = store.get(StorageKey::Principal).await.map_err(Error::storage)?;

    let session = match (token, principal) {
      (Some(token), Some(raw)) => match serde_json::from_str::<StoredPrincipal>(&raw) {
        Ok(principal) => Some(Session::from_parts(token, principal)),
        Err(e) => {
          tracing::warn!("discarding unreadable stored principal: {e}");
          None
        }
      },
      (None, None) => None,
      _ => {
        tracing::warn!("discarding incomplete stored session");
        None
      }
    };

    let ctx = Self { store, current: RwLock::new(None) };
    match session {
      Some(s) => {
        tracing::debug!(kind = %s.kind, "restored session");
        *ctx.write() = Some(s);
      }
      None => ctx.clear_credentials().await?,
    }
    Ok(ctx)
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
    self.current.write().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn current(&self) -> Option<Session> {
    self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn token(&self) -> Option<String> {
    self
      .current
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .map(|s| s.token.clone())
  }

  pub fn is_active(&self) -> bool { self.token().is_some() }

  /// Replace any existing session with `session` and persist it.
  pub async fn establish(&self, session: Session) -> Result<()> {
    self.teardown().await?;
    let principal =
      serde_json::to_string(&session.principal()).map_err(smartflow_core::Error::from)?;
    self
      .store
      .put(StorageKey::Principal, principal)
      .await
      .map_err(Error::storage)?;
    self
      .store
      .put(StorageKey::AuthToken, session.token.clone())
      .await
      .map_err(Error::storage)?;
    tracing::info!(kind = %session.kind, id = %session.profile.identifier, "session established");
    *self.write() = Some(session);
    Ok(())
  }

  /// Forget the session and remove every persisted key.
  pub async fn teardown(&self) -> Result<()> {
    if self.write().take().is_some() {
      tracing::info!("session torn down");
    }
    self.store.remove(&StorageKey::ALL).await.map_err(Error::storage)
  }

  /// Tear down only while `token` is still the current token; returns
  /// whether it was.
  pub async fn teardown_if(&self, token: &str) -> Result<bool> {
    {
      let mut current = self.write();
      if current.as_ref().is_none_or(|s| s.token != token) {
        return Ok(false);
      }
      *current = None;
    }
    tracing::info!("session torn down");
    self.store.remove(&StorageKey::ALL).await.map_err(Error::storage)?;
    Ok(true)
  }

  async fn clear_credentials(&self) -> Result<()> {
    self
      .store
      .remove(&[StorageKey::AuthToken, StorageKey::Principal])
      .await
      .map_err(Error::storage)
  }

  /// Persist the raw request list last fetched from the server.
  pub async fn cache_requests(&self, requests: &[UpdateRequest]) -> Result<()> {
    let raw = serde_json::to_string(requests).map_err(smartflow_core::Error::from)?;
    self
      .store
      .put(StorageKey::RequestCache, raw)
      .await
      .map_err(Error::storage)
  }

  /// The cached request list; empty when nothing is cached or the cache is
  /// unreadable.
  pub async fn cached_requests(&self) -> Result<Vec<UpdateRequest>> {
    let Some(raw) = self
      .store
      .get(StorageKey::RequestCache)
      .await
      .map_err(Error::storage)?
    else {
      return Ok(Vec::new());
    };
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
      tracing::warn!("ignoring unreadable request cache: {e}");
      Vec::new()
    }))
  }

  pub fn store(&self) -> &S { &self.store }
}
