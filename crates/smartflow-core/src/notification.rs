//! Notifications and the client-side read-state board.
//!
//! Notifications are created by the server. The client only flips the read
//! flag and never removes an entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
  Success,
  Warning,
  Error,
  Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id:         u64,
  pub category:   NotificationCategory,
  pub title:      String,
  pub message:    String,
  #[serde(default)]
  pub request_id: Option<String>,
  #[serde(default)]
  pub read:       bool,
  #[serde(deserialize_with = "crate::timestamp::deserialize")]
  pub created_at: DateTime<Utc>,
}

/// Response of `GET /notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationList {
  pub notifications: Vec<Notification>,
}

// ─── Board ───────────────────────────────────────────────────────────────────

/// The notifications a client currently holds.
///
/// The unread count is derived from the items on every call, so it cannot
/// drift from the read flags.
#[derive(Debug, Clone, Default)]
pub struct NotificationBoard {
  items: Vec<Notification>,
}

impl NotificationBoard {
  pub fn new(items: Vec<Notification>) -> Self { Self { items } }

  pub fn items(&self) -> &[Notification] { &self.items }

  pub fn unread_count(&self) -> usize { self.items.iter().filter(|n| !n.read).count() }

  pub fn unread(&self) -> impl Iterator<Item = &Notification> {
    self.items.iter().filter(|n| !n.read)
  }

  pub fn mark_read(&mut self, id: u64) -> Result<()> {
    let item = self
      .items
      .iter_mut()
      .find(|n| n.id == id)
      .ok_or(Error::NotificationNotFound(id))?;
    item.read = true;
    Ok(())
  }

  pub fn mark_all_read(&mut self) {
    for n in &mut self.items {
      n.read = true;
    }
  }

  /// Fold a fresh server listing into the board.
  ///
  /// Entries already read locally stay read. Entries the server no longer
  /// lists are kept. New entries are appended in server order.
  pub fn merge(&mut self, fresh: Vec<Notification>) {
    for mut incoming in fresh {
      match self.items.iter_mut().find(|n| n.id == incoming.id) {
        Some(existing) => {
          incoming.read |= existing.read;
          *existing = incoming;
        }
        None => self.items.push(incoming),
      }
    }
  }
}
