//! Risk scores and their display buckets.
//!
//! The score is computed by the server and is read-only input here. The
//! client only ever buckets it; this module is the single place the bucket
//! thresholds live.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scores strictly above this are [`RiskBucket::High`].
pub const HIGH_THRESHOLD: f64 = 0.7;

/// Scores strictly above this (and not high) are [`RiskBucket::Medium`].
pub const MEDIUM_THRESHOLD: f64 = 0.4;

// ─── Score ───────────────────────────────────────────────────────────────────

/// A server-computed risk score, guaranteed to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RiskScore(f64);

impl RiskScore {
  /// Rejects NaN and anything outside `[0, 1]`.
  pub fn new(value: f64) -> Result<Self> {
    if (0.0..=1.0).contains(&value) {
      Ok(Self(value))
    } else {
      Err(Error::RiskOutOfRange(value))
    }
  }

  /// Clamp into `[0, 1]`; NaN maps to zero.
  pub fn saturating(value: f64) -> Self {
    if value.is_nan() { Self(0.0) } else { Self(value.clamp(0.0, 1.0)) }
  }

  pub fn value(self) -> f64 { self.0 }

  /// The score as a whole percentage, as shown on the review screen.
  pub fn percent(self) -> u8 { (self.0 * 100.0).round() as u8 }

  pub fn bucket(self) -> RiskBucket { RiskBucket::classify(self) }
}

impl TryFrom<f64> for RiskScore {
  type Error = Error;

  fn try_from(value: f64) -> Result<Self> { Self::new(value) }
}

impl From<RiskScore> for f64 {
  fn from(score: RiskScore) -> Self { score.0 }
}

impl fmt::Display for RiskScore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.2}", self.0)
  }
}

// ─── Bucket ──────────────────────────────────────────────────────────────────

/// Display classification of a [`RiskScore`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskBucket {
  Low,
  Medium,
  High,
}

impl RiskBucket {
  /// Total over every valid score.
  pub fn classify(score: RiskScore) -> Self {
    let r = score.value();
    if r > HIGH_THRESHOLD {
      Self::High
    } else if r > MEDIUM_THRESHOLD {
      Self::Medium
    } else {
      Self::Low
    }
  }

  /// Medium and high risk requests need an officer decision.
  pub fn requires_review(self) -> bool { !matches!(self, Self::Low) }

  pub fn allows_auto_approval(self) -> bool { matches!(self, Self::Low) }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "Low",
      Self::Medium => "Medium",
      Self::High => "High",
    }
  }
}

impl fmt::Display for RiskBucket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bucket(r: f64) -> RiskBucket { RiskScore::new(r).unwrap().bucket() }

  #[test]
  fn thresholds_are_exclusive_below() {
    assert_eq!(bucket(0.0), RiskBucket::Low);
    assert_eq!(bucket(0.4), RiskBucket::Low);
    assert_eq!(bucket(0.41), RiskBucket::Medium);
    assert_eq!(bucket(0.7), RiskBucket::Medium);
    assert_eq!(bucket(0.71), RiskBucket::High);
    assert_eq!(bucket(1.0), RiskBucket::High);
  }

  #[test]
  fn classification_matches_definition_across_range() {
    for i in 0..=1000 {
      let r = f64::from(i) / 1000.0;
      let b = bucket(r);
      assert_eq!(b == RiskBucket::High, r > 0.7, "r = {r}");
      assert_eq!(b == RiskBucket::Medium, r > 0.4 && r <= 0.7, "r = {r}");
      assert_eq!(b == RiskBucket::Low, r <= 0.4, "r = {r}");
      // Same input, same bucket.
      assert_eq!(b, bucket(r));
    }
  }

  #[test]
  fn out_of_range_scores_are_rejected() {
    assert!(RiskScore::new(-0.01).is_err());
    assert!(RiskScore::new(1.01).is_err());
    assert!(RiskScore::new(f64::NAN).is_err());
  }

  #[test]
  fn saturating_clamps() {
    assert_eq!(RiskScore::saturating(1.4).value(), 1.0);
    assert_eq!(RiskScore::saturating(-0.2).value(), 0.0);
    assert_eq!(RiskScore::saturating(f64::NAN).value(), 0.0);
  }

  #[test]
  fn deserialising_validates_range() {
    let ok: RiskScore = serde_json::from_str("0.85").unwrap();
    assert_eq!(ok.bucket(), RiskBucket::High);
    assert!(serde_json::from_str::<RiskScore>("1.5").is_err());
  }

  #[test]
  fn percent_rounds() {
    assert_eq!(RiskScore::new(0.456).unwrap().percent(), 46);
    assert_eq!(RiskScore::new(0.85).unwrap().percent(), 85);
  }

  #[test]
  fn only_low_allows_auto_approval() {
    assert!(RiskBucket::Low.allows_auto_approval());
    assert!(RiskBucket::Medium.requires_review());
    assert!(RiskBucket::High.requires_review());
  }
}
