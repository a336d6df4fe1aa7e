//! Server timestamps: RFC 3339, or a naive ISO 8601 value taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de::Error as _};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
  if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
    return Some(at.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
    .ok()
    .map(|naive| naive.and_utc())
}

fn parse_or_reject<E: serde::de::Error>(raw: &str) -> Result<DateTime<Utc>, E> {
  parse(raw).ok_or_else(|| E::custom(format!("unrecognised timestamp {raw:?}")))
}

pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
  let raw = String::deserialize(de)?;
  parse_or_reject(&raw)
}

pub fn deserialize_option<'de, D: Deserializer<'de>>(
  de: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
  Option::<String>::deserialize(de)?
    .map(|raw| parse_or_reject(&raw))
    .transpose()
}
