//! In-memory state behind the reference API.
//!
//! The backend holds accounts, tokens, requests, documents, and notifications
//! in one mutex. It has no risk model: scores are injected through
//! [`Backend::assess`], or derived from a fixed per-type table when
//! auto-assessment is switched on for demos.

use std::{
  collections::{HashMap, HashSet},
  sync::{Mutex, MutexGuard, PoisonError},
};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::http::StatusCode;
use bytes::Bytes;
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use smartflow_core::{
  lifecycle::OfficerAction,
  notification::{Notification, NotificationCategory},
  request::{
    DecisionRequest, FieldChange, SubmitResponse, UpdateRequest, UpdateSubmission,
    UpdateType, UploadResponse,
  },
  risk::RiskScore,
  session::{LoginRequest, LoginResponse, PrincipalKind, PrincipalProfile},
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Records ─────────────────────────────────────────────────────────────────

/// The caller behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
  pub kind:       PrincipalKind,
  pub identifier: String,
  pub name:       String,
}

#[derive(Clone)]
struct Account {
  profile:       PrincipalProfile,
  password_hash: String,
}

struct StoredRequest {
  owner:  String,
  record: UpdateRequest,
}

struct StoredDocument {
  owner: String,
}

#[derive(Default)]
struct Inner {
  /// Keyed by Aadhaar number.
  citizens:        HashMap<String, Account>,
  /// Keyed by email; officers may also log in with their officer id.
  officers:        HashMap<String, Account>,
  tokens:          HashMap<String, Principal>,
  /// Submission order.
  requests:        Vec<StoredRequest>,
  documents:       HashMap<String, StoredDocument>,
  notifications:   Vec<(String, Notification)>,
  next_notice_id:  u64,
  failing_uploads: HashSet<String>,
  garble:          Option<StatusCode>,
  auto_assess:     bool,
  calls:           Vec<String>,
}

impl Inner {
  fn find_request(&mut self, id: &str) -> Result<&mut StoredRequest, ApiError> {
    self
      .requests
      .iter_mut()
      .find(|r| r.record.request_id == id)
      .ok_or_else(|| ApiError::NotFound(format!("request {id} not found")))
  }

  fn notify(
    &mut self,
    owner: &str,
    category: NotificationCategory,
    title: &str,
    message: String,
    request_id: &str,
  ) {
    self.next_notice_id += 1;
    self.notifications.push((owner.to_owned(), Notification {
      id: self.next_notice_id,
      category,
      title: title.to_owned(),
      message,
      request_id: Some(request_id.to_owned()),
      read: false,
      created_at: Utc::now(),
    }));
  }

  /// Record a score and let it drive the server-side routing decision.
  fn apply_assessment(&mut self, id: &str, score: RiskScore) -> Result<(), ApiError> {
    let stored = self.find_request(id)?;
    stored.record.risk_score = Some(score);
    let bucket = score.bucket();
    let owner = stored.owner.clone();
    let label = stored.record.update_type.label();

    if bucket.allows_auto_approval() {
      stored.record.status = "auto_approved".into();
      self.notify(
        &owner,
        NotificationCategory::Success,
        "Update Auto-Approved",
        format!("Your {label} request ({id}) has been automatically approved."),
        id,
      );
    } else {
      stored.record.status = "review".into();
      self.notify(
        &owner,
        NotificationCategory::Info,
        "Under Officer Review",
        format!("Your {label} request ({id}) was flagged for review ({bucket} risk)."),
        id,
      );
    }
    Ok(())
  }
}

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Shared state for the reference API. Wrap in an `Arc` and hand to
/// [`crate::app`].
#[derive(Default)]
pub struct Backend {
  inner: Mutex<Inner>,
}

impl Backend {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  pub fn add_citizen(&self, aadhaar: &str, name: &str, password: &str) -> Result<(), ApiError> {
    let account = Account {
      profile:       PrincipalProfile {
        name:       name.to_owned(),
        identifier: aadhaar.to_owned(),
        email:      None,
      },
      password_hash: hash_password(password)?,
    };
    self.lock().citizens.insert(aadhaar.to_owned(), account);
    Ok(())
  }

  pub fn add_officer(
    &self,
    officer_id: &str,
    email: &str,
    name: &str,
    password: &str,
  ) -> Result<(), ApiError> {
    let account = Account {
      profile:       PrincipalProfile {
        name:       name.to_owned(),
        identifier: officer_id.to_owned(),
        email:      Some(email.to_owned()),
      },
      password_hash: hash_password(password)?,
    };
    self.lock().officers.insert(email.to_owned(), account);
    Ok(())
  }

  /// Verify credentials and mint a bearer token.
  pub fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ApiError> {
    let account = {
      let inner = self.lock();
      match req.principal_kind {
        PrincipalKind::Citizen => inner.citizens.get(&req.identifier).cloned(),
        PrincipalKind::Officer => inner.officers.get(&req.identifier).cloned().or_else(|| {
          inner
            .officers
            .values()
            .find(|a| a.profile.identifier == req.identifier)
            .cloned()
        }),
      }
    };
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());
    let account = account.ok_or_else(invalid)?;

    // Hash verification is slow; the lock is not held across it.
    let parsed = PasswordHash::new(&account.password_hash).map_err(|_| invalid())?;
    Argon2::default()
      .verify_password(req.password.as_bytes(), &parsed)
      .map_err(|_| invalid())?;

    let token = mint_token();
    self.lock().tokens.insert(token.clone(), Principal {
      kind:       req.principal_kind,
      identifier: account.profile.identifier.clone(),
      name:       account.profile.name.clone(),
    });
    tracing::info!(kind = %req.principal_kind, id = %account.profile.identifier, "login");
    Ok(LoginResponse { token, user: account.profile })
  }

  pub fn authenticate(&self, token: &str) -> Option<Principal> {
    self.lock().tokens.get(token).cloned()
  }

  pub fn logout(&self, token: &str) { self.lock().tokens.remove(token); }

  /// Invalidate every issued token, as if they had all expired.
  pub fn revoke_all_tokens(&self) { self.lock().tokens.clear(); }

  // ── Documents ─────────────────────────────────────────────────────────────

  pub fn store_document(
    &self,
    owner: &Principal,
    filename: &str,
    content: Bytes,
  ) -> Result<UploadResponse, ApiError> {
    let mut inner = self.lock();
    if inner.failing_uploads.contains(filename) {
      return Err(ApiError::Internal(format!("could not store {filename}")));
    }

    let mut hasher = Sha256::new();
    hasher.update(&content);
    hasher.update(filename.as_bytes());
    hasher.update(inner.documents.len().to_le_bytes());
    let file_id = hex::encode(&hasher.finalize()[..8]);

    inner
      .documents
      .insert(file_id.clone(), StoredDocument { owner: owner.identifier.clone() });
    tracing::debug!(%file_id, filename, bytes = content.len(), "stored document");
    Ok(UploadResponse { file_id, filename: Some(filename.to_owned()) })
  }

  // ── Requests ──────────────────────────────────────────────────────────────

  pub fn submit(
    &self,
    owner: &Principal,
    body: UpdateSubmission,
  ) -> Result<SubmitResponse, ApiError> {
    if owner.kind != PrincipalKind::Citizen {
      return Err(ApiError::Forbidden("Only citizens can submit updates".into()));
    }
    if body.new_data.trim().is_empty() {
      return Err(ApiError::BadRequest("update_type and new_data required".into()));
    }

    let mut inner = self.lock();
    for doc in &body.documents {
      match inner.documents.get(doc) {
        Some(d) if d.owner == owner.identifier => {}
        _ => return Err(ApiError::BadRequest(format!("unknown document {doc}"))),
      }
    }

    let request_id = generate_request_id();
    let has_documents = !body.documents.is_empty();
    let record = UpdateRequest {
      request_id:       request_id.clone(),
      update_type:      body.update_type,
      status:           "submitted".into(),
      submitted_at:     Some(Utc::now()),
      risk_score:       None,
      rejection_reason: None,
      comments:         Vec::new(),
      documents:        body.documents,
      details:          vec![FieldChange {
        field:     body.update_type.to_string(),
        old_value: None,
        new_value: Some(body.new_data),
      }],
      user_name:        None,
    };
    inner.requests.push(StoredRequest { owner: owner.identifier.clone(), record });

    if inner.auto_assess {
      inner.apply_assessment(&request_id, demo_risk(body.update_type, has_documents))?;
    }

    let stored = inner.find_request(&request_id)?;
    tracing::info!(%request_id, status = %stored.record.status, "update submitted");
    Ok(SubmitResponse {
      request_id,
      status: stored.record.status.clone(),
      risk_score: stored.record.risk_score,
      auto_approved: stored.record.status == "auto_approved",
    })
  }

  pub fn get_request(&self, caller: &Principal, id: &str) -> Result<UpdateRequest, ApiError> {
    let mut inner = self.lock();
    let stored = inner.find_request(id)?;
    if caller.kind == PrincipalKind::Citizen && stored.owner != caller.identifier {
      return Err(ApiError::Forbidden("Unauthorized".into()));
    }
    Ok(stored.record.clone())
  }

  /// A citizen's own requests, newest first.
  pub fn list_requests(&self, caller: &Principal) -> Result<Vec<UpdateRequest>, ApiError> {
    if caller.kind != PrincipalKind::Citizen {
      return Err(ApiError::Forbidden("Unauthorized".into()));
    }
    Ok(
      self
        .lock()
        .requests
        .iter()
        .rev()
        .filter(|r| r.owner == caller.identifier)
        .map(|r| r.record.clone())
        .collect(),
    )
  }

  /// Every request still awaiting an outcome, riskiest first and newest
  /// first within equal scores.
  ///
  /// Records whose status does not resolve are left out.
  pub fn pending_requests(&self, officer: &Principal) -> Result<Vec<UpdateRequest>, ApiError> {
    if officer.kind != PrincipalKind::Officer {
      return Err(ApiError::Forbidden("Officer access only".into()));
    }
    let inner = self.lock();
    let mut queue: Vec<UpdateRequest> = inner
      .requests
      .iter()
      .filter(|r| r.record.stage().is_ok_and(|stage| !stage.is_terminal()))
      .map(|r| {
        let mut record = r.record.clone();
        record.user_name = inner.citizens.get(&r.owner).map(|a| a.profile.name.clone());
        record
      })
      .collect();
    queue.sort_by(|a, b| {
      let risk = |r: &UpdateRequest| r.risk_score.map_or(-1.0, RiskScore::value);
      risk(b)
        .total_cmp(&risk(a))
        .then_with(|| b.submitted_at.cmp(&a.submitted_at))
    });
    Ok(queue)
  }

  /// Apply an officer decision. Only requests in review accept one.
  pub fn decide(&self, officer: &Principal, body: &DecisionRequest) -> Result<(), ApiError> {
    if officer.kind != PrincipalKind::Officer {
      return Err(ApiError::Forbidden("Officer access only".into()));
    }
    let action = body.to_action();
    let mut inner = self.lock();
    let stored = inner.find_request(&body.request_id)?;
    let stage = stored.record.stage()?;
    stage.apply(&action)?;

    let owner = stored.owner.clone();
    let id = body.request_id.clone();
    let (category, title, message) = match &action {
      OfficerAction::Approve => {
        stored.record.status = "approved".into();
        (NotificationCategory::Success, "Request Approved", format!("Request {id} was approved."))
      }
      OfficerAction::Reject { reason } => {
        stored.record.status = "rejected".into();
        stored.record.rejection_reason = Some(reason.clone());
        (NotificationCategory::Error, "Request Rejected", format!("Request {id} was rejected: {reason}"))
      }
      OfficerAction::RequestInfo { comment } => {
        stored.record.comments.push(comment.clone());
        (
          NotificationCategory::Warning,
          "Additional Information Required",
          format!("Request {id}: {comment}"),
        )
      }
    };
    inner.notify(&owner, category, title, message, &id);
    tracing::info!(request_id = %id, action = %action.kind(), officer = %officer.identifier, "decision");
    Ok(())
  }

  pub fn notifications_for(&self, caller: &Principal) -> Vec<Notification> {
    self
      .lock()
      .notifications
      .iter()
      .filter(|(owner, _)| *owner == caller.identifier)
      .map(|(_, n)| n.clone())
      .collect()
  }

  // ── Controls ──────────────────────────────────────────────────────────────

  /// Assess every future submission with [`demo_risk`].
  pub fn set_auto_assess(&self, on: bool) { self.lock().auto_assess = on; }

  /// Inject a risk score for a submitted request and route it.
  pub fn assess(&self, id: &str, score: RiskScore) -> Result<(), ApiError> {
    self.lock().apply_assessment(id, score)
  }

  /// Overwrite the raw status of a request.
  pub fn set_status(&self, id: &str, status: &str) -> Result<(), ApiError> {
    self.lock().find_request(id)?.record.status = status.to_owned();
    Ok(())
  }

  /// Make uploads of files with this name fail with a 500.
  pub fn fail_uploads_named(&self, filename: &str) {
    self.lock().failing_uploads.insert(filename.to_owned());
  }

  /// Answer every request with `status` and a non-JSON body, or stop doing so.
  pub fn garble_responses(&self, status: Option<StatusCode>) { self.lock().garble = status; }

  pub fn garbled(&self) -> Option<StatusCode> { self.lock().garble }

  pub fn record_call(&self, call: String) { self.lock().calls.push(call); }

  /// Every request received, as `"METHOD /path"`, in arrival order.
  pub fn calls(&self) -> Vec<String> { self.lock().calls.clone() }

  pub fn request(&self, id: &str) -> Option<UpdateRequest> {
    self
      .lock()
      .requests
      .iter()
      .find(|r| r.record.request_id == id)
      .map(|r| r.record.clone())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

fn mint_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// `REQ` + UTC timestamp + six hex digits, e.g. `REQ20250105101500A1B2C3`.
fn generate_request_id() -> String {
  let stamp = Utc::now().format("%Y%m%d%H%M%S");
  let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
  format!("REQ{stamp}{suffix}")
}

/// Fixed demo scoring: a per-type base, lowered when documents are attached
/// and raised when none are.
pub fn demo_risk(update_type: UpdateType, has_documents: bool) -> RiskScore {
  let base = match update_type {
    UpdateType::NameChange => 0.6,
    UpdateType::MaritalStatus => 0.5,
    UpdateType::DobChange => 0.4,
    UpdateType::AddressChange => 0.3,
    UpdateType::PhoneChange | UpdateType::EmailChange => 0.2,
  };
  let adjusted: f64 = if has_documents { base - 0.2 } else { base + 0.4 };
  RiskScore::saturating((adjusted * 100.0).round() / 100.0)
}
