//! The SQLite implementation of [`SessionStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use smartflow_core::store::{SessionStore, StorageKey};

use crate::{
  Error, Result,
  encode::{decode_dt, decode_key, encode_dt, encode_key},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Session storage backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Two stores
/// opened on the same file see each other's writes only on their next read;
/// there is no cross-process notification.
#[derive(Clone)]
pub struct SqliteSessionStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSessionStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The keys that currently hold a value.
  pub async fn stored_keys(&self) -> Result<Vec<StorageKey>> {
    let raw: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT key FROM session_entries ORDER BY key")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raw.iter().map(|s| decode_key(s)).collect()
  }

  /// When `key` was last written, if it holds a value.
  pub async fn updated_at(&self, key: StorageKey) -> Result<Option<DateTime<Utc>>> {
    let key_str = encode_key(key);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT updated_at FROM session_entries WHERE key = ?1",
            rusqlite::params![key_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteSessionStore {
  type Error = Error;

  async fn get(&self, key: StorageKey) -> Result<Option<String>> {
    let key_str = encode_key(key);

    let value = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT value FROM session_entries WHERE key = ?1",
            rusqlite::params![key_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;
    Ok(value)
  }

  async fn put(&self, key: StorageKey, value: String) -> Result<()> {
    let key_str = encode_key(key);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO session_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                          updated_at = excluded.updated_at",
          rusqlite::params![key_str, value, at_str],
        )?;
        Ok(())
      })
      .await?;
    tracing::debug!(key = key_str, "stored session entry");
    Ok(())
  }

  async fn remove(&self, keys: &'static [StorageKey]) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for key in keys {
          tx.execute(
            "DELETE FROM session_entries WHERE key = ?1",
            rusqlite::params![encode_key(*key)],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    tracing::debug!(count = keys.len(), "removed session entries");
    Ok(())
  }
}
