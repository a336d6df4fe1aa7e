//! Encoding helpers between domain types and the text stored in SQLite.
//!
//! Timestamps are stored as RFC 3339 strings; keys by their fixed names.

use chrono::{DateTime, Utc};
use smartflow_core::store::StorageKey;

use crate::{Error, Result};

// ─── StorageKey ───────────────────────────────────────────────────────────────

pub fn encode_key(key: StorageKey) -> &'static str { key.as_str() }

pub fn decode_key(s: &str) -> Result<StorageKey> {
  StorageKey::ALL
    .into_iter()
    .find(|k| k.as_str() == s)
    .ok_or_else(|| Error::UnknownKey(s.to_owned()))
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}
