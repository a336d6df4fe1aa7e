//! Refuses a mutating call while an identical one is still unresolved.

use std::{
  collections::HashSet,
  sync::{Mutex, PoisonError},
};

use crate::{Error, Result};

type Key = (&'static str, String);

/// The set of calls currently in flight, keyed by action and target.
#[derive(Debug, Default)]
pub struct InFlight {
  keys: Mutex<HashSet<Key>>,
}

impl InFlight {
  pub fn new() -> Self { Self::default() }

  /// Register `(action, key)`. The registration lasts as long as the
  /// returned guard.
  pub fn acquire(&self, action: &'static str, key: &str) -> Result<InFlightGuard<'_>> {
    let entry = (action, key.to_owned());
    let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
    if !keys.insert(entry.clone()) {
      tracing::warn!(action, key, "refusing duplicate in-flight call");
      return Err(Error::AlreadyInFlight { action, key: key.to_owned() });
    }
    Ok(InFlightGuard { owner: self, entry })
  }

  pub fn is_busy(&self, action: &'static str, key: &str) -> bool {
    self
      .keys
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains(&(action, key.to_owned()))
  }
}

/// Releases its key on drop, whether the call succeeded or failed.
#[must_use]
pub struct InFlightGuard<'a> {
  owner: &'a InFlight,
  entry: Key,
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self
      .owner
      .keys
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.entry);
  }
}
