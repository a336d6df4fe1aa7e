//! Update requests and the JSON shapes exchanged about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
  Result,
  lifecycle::{ActionKind, OfficerAction, Stage},
  risk::{RiskBucket, RiskScore},
};

// ─── Update type ─────────────────────────────────────────────────────────────

/// The demographic field a request asks to change.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateType {
  AddressChange,
  NameChange,
  MaritalStatus,
  DobChange,
  PhoneChange,
  EmailChange,
}

impl UpdateType {
  pub fn label(self) -> &'static str {
    match self {
      Self::AddressChange => "Address Change",
      Self::NameChange => "Name Correction",
      Self::MaritalStatus => "Marital Status",
      Self::DobChange => "Date of Birth",
      Self::PhoneChange => "Mobile Number",
      Self::EmailChange => "Email Address",
    }
  }

  /// Supporting documents the portal asks for with this kind of update.
  pub fn required_documents(self) -> &'static [&'static str] {
    match self {
      Self::AddressChange => &["Address Proof (Electricity Bill/Rent Agreement)"],
      Self::NameChange => &["Gazette Notification", "Identity Proof"],
      Self::MaritalStatus => &["Marriage Certificate"],
      Self::DobChange => &["Birth Certificate", "SSLC Marksheet"],
      Self::PhoneChange | Self::EmailChange => &[],
    }
  }
}

// ─── Update request ──────────────────────────────────────────────────────────

/// One changed field, as reported in a request's `details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
  pub field:     String,
  #[serde(rename = "oldValue", default)]
  pub old_value: Option<String>,
  #[serde(rename = "newValue", default)]
  pub new_value: Option<String>,
}

/// A request as reported by `GET /updates/{id}` and `GET /updates/my-requests`.
///
/// `status` is kept as the raw server string; call [`UpdateRequest::stage`]
/// to obtain the display stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
  pub request_id:       String,
  pub update_type:      UpdateType,
  pub status:           String,
  #[serde(default, deserialize_with = "crate::timestamp::deserialize_option")]
  pub submitted_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub risk_score:       Option<RiskScore>,
  #[serde(default)]
  pub rejection_reason: Option<String>,
  /// Officer comments appended by `request_info`, oldest first.
  #[serde(default)]
  pub comments:         Vec<String>,
  /// Document ids attached at submission.
  #[serde(default)]
  pub documents:        Vec<String>,
  #[serde(default)]
  pub details:          Vec<FieldChange>,
  /// Submitting citizen, filled in on the officer queue.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_name:        Option<String>,
}

impl UpdateRequest {
  /// Resolve the display stage from the current fields. Never cached.
  pub fn stage(&self) -> Result<Stage> { Stage::resolve(&self.status, self.risk_score) }

  pub fn risk_bucket(&self) -> Option<RiskBucket> { self.risk_score.map(RiskScore::bucket) }

  /// The most recent officer comment, if any.
  pub fn officer_comment(&self) -> Option<&str> {
    self
      .rejection_reason
      .as_deref()
      .filter(|r| !r.is_empty())
      .or_else(|| self.comments.last().map(String::as_str))
  }

  /// Submission date as shown in request lists, e.g. `Jan 05, 2025`.
  pub fn submitted_label(&self) -> String {
    self
      .submitted_at
      .map(|at| at.format("%b %d, %Y").to_string())
      .unwrap_or_else(|| "N/A".to_owned())
  }
}

// ─── Citizen dashboard ───────────────────────────────────────────────────────

/// Per-stage counts for a citizen's requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStats {
  pub total:     usize,
  /// Approved by an officer or auto-approved.
  pub approved:  usize,
  /// Everything not yet terminal.
  pub in_review: usize,
  pub rejected:  usize,
}

impl RequestStats {
  /// Requests whose stage cannot be resolved count toward `total` only.
  pub fn from_requests(requests: &[UpdateRequest]) -> Self {
    let mut stats = Self { total: requests.len(), ..Self::default() };
    for stage in requests.iter().filter_map(|r| r.stage().ok()) {
      match stage {
        Stage::Approved | Stage::AutoApproved => stats.approved += 1,
        Stage::Rejected => stats.rejected += 1,
        _ => stats.in_review += 1,
      }
    }
    stats
  }
}

// ─── Wire bodies ─────────────────────────────────────────────────────────────

/// JSON body of `POST /updates/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSubmission {
  pub update_type: UpdateType,
  pub new_data:    String,
  /// Ids returned by `POST /documents/upload`.
  #[serde(default)]
  pub documents:   Vec<String>,
}

impl UpdateSubmission {
  pub fn new(update_type: UpdateType, new_data: impl Into<String>) -> Self {
    Self { update_type, new_data: new_data.into(), documents: Vec::new() }
  }

  /// An address change, composed the way the portal form does.
  pub fn address(street: &str, city: &str, state: &str, pincode: &str) -> Self {
    Self::new(
      UpdateType::AddressChange,
      format!("{street}, {city}, {state} - {pincode}"),
    )
  }
}

/// Response of `POST /updates/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
  pub request_id:    String,
  pub status:        String,
  #[serde(default)]
  pub risk_score:    Option<RiskScore>,
  #[serde(default)]
  pub auto_approved: bool,
}

/// Response of `POST /documents/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
  #[serde(alias = "fileId")]
  pub file_id:  String,
  #[serde(default, alias = "fileName")]
  pub filename: Option<String>,
}

/// Response of `GET /updates/my-requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestList {
  pub requests: Vec<UpdateRequest>,
}

/// JSON body of `POST /officer/update-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
  pub request_id: String,
  pub action:     ActionKind,
  #[serde(default)]
  pub reason:     Option<String>,
}

impl DecisionRequest {
  pub fn new(request_id: impl Into<String>, action: &OfficerAction) -> Self {
    Self {
      request_id: request_id.into(),
      action:     action.kind(),
      reason:     action.reason().map(str::to_owned),
    }
  }

  /// Rebuild the typed action from the wire fields.
  pub fn to_action(&self) -> OfficerAction {
    let text = self.reason.clone().unwrap_or_default();
    match self.action {
      ActionKind::Approve => OfficerAction::Approve,
      ActionKind::Reject => OfficerAction::Reject { reason: text },
      ActionKind::RequestInfo => OfficerAction::RequestInfo { comment: text },
    }
  }
}
