//! Lifecycle stages of an update request and the officer action contract.
//!
//! The stage is never stored by the client. It is resolved on every read from
//! the server-reported `status` string and the latest risk score, so a stale
//! bucket can never outlive the score it was computed from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  risk::{RiskBucket, RiskScore},
};

// ─── Stage ───────────────────────────────────────────────────────────────────

/// The client-visible lifecycle stage of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Submitted,
  /// Awaiting assignment; the server has not produced a risk score yet.
  Pending,
  Processing,
  AutoApproved,
  Review,
  Approved,
  Rejected,
}

impl Stage {
  /// Resolve the display stage from a server status and risk score.
  ///
  /// Terminal statuses reported by the server win. Non-terminal statuses are
  /// routed by risk bucket: medium and high go to [`Stage::Review`], low stays
  /// in [`Stage::Processing`] awaiting the server's auto-approval decision.
  /// Without a score, `submitted` stays [`Stage::Submitted`] and the other
  /// non-terminal statuses are [`Stage::Pending`].
  /// An `auto_approved` status on a request that is not low risk breaks the
  /// contract and is reported as an error rather than displayed.
  pub fn resolve(status: &str, risk: Option<RiskScore>) -> Result<Self> {
    let bucket = risk.map(RiskScore::bucket);
    match status {
      "approved" => Ok(Self::Approved),
      "rejected" => Ok(Self::Rejected),
      "auto_approved" => match bucket {
        Some(b) if !b.allows_auto_approval() => {
          Err(Error::ForbiddenAutoApproval { bucket: b.as_str() })
        }
        _ => Ok(Self::AutoApproved),
      },
      "review" => Ok(Self::Review),
      "submitted" | "pending" | "processing" | "duplicate" => Ok(match bucket {
        None if status == "submitted" => Self::Submitted,
        None => Self::Pending,
        Some(b) if b.requires_review() => Self::Review,
        Some(_) => Self::Processing,
      }),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::AutoApproved | Self::Approved | Self::Rejected)
  }

  /// Whether an officer may act on a request in this stage.
  pub fn accepts_officer_action(self) -> bool { matches!(self, Self::Review) }

  /// Apply an officer action, returning the stage it leads to.
  pub fn apply(self, action: &OfficerAction) -> Result<Self> {
    if !self.accepts_officer_action() {
      return Err(Error::IllegalTransition { action: action.kind(), stage: self });
    }
    action.validate()?;
    Ok(match action {
      OfficerAction::Approve => Self::Approved,
      OfficerAction::Reject { .. } => Self::Rejected,
      OfficerAction::RequestInfo { .. } => Self::Review,
    })
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Submitted => "submitted",
      Self::Pending => "pending",
      Self::Processing => "processing",
      Self::AutoApproved => "auto_approved",
      Self::Review => "review",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }

  /// Human-readable label for status badges.
  pub fn label(self) -> &'static str {
    match self {
      Self::Submitted => "Submitted",
      Self::Pending => "Pending",
      Self::Processing => "Processing",
      Self::AutoApproved => "Auto-Approved",
      Self::Review => "Under Review",
      Self::Approved => "Approved",
      Self::Rejected => "Rejected",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Officer actions ─────────────────────────────────────────────────────────

/// The wire discriminant of an officer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
  Approve,
  Reject,
  RequestInfo,
}

impl ActionKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Approve => "approve",
      Self::Reject => "reject",
      Self::RequestInfo => "request_info",
    }
  }
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A decision an officer can take on a request under review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficerAction {
  Approve,
  Reject { reason: String },
  /// Ask the citizen for more information; the stage does not change.
  RequestInfo { comment: String },
}

impl OfficerAction {
  pub fn kind(&self) -> ActionKind {
    match self {
      Self::Approve => ActionKind::Approve,
      Self::Reject { .. } => ActionKind::Reject,
      Self::RequestInfo { .. } => ActionKind::RequestInfo,
    }
  }

  /// Local precondition check, run before any request is issued.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Reject { reason } if reason.trim().is_empty() => {
        Err(Error::MissingReason)
      }
      Self::RequestInfo { comment } if comment.trim().is_empty() => {
        Err(Error::MissingComment)
      }
      _ => Ok(()),
    }
  }

  /// The free-text that accompanies the action on the wire.
  pub fn reason(&self) -> Option<&str> {
    match self {
      Self::Approve => None,
      Self::Reject { reason } => Some(reason),
      Self::RequestInfo { comment } => Some(comment),
    }
  }
}
