//! Auth-guarded HTTP client for the SmartFlow JSON API.
//!
//! Every authenticated call attaches the bearer token from the
//! [`SessionContext`]. Without a session the call fails with
//! [`Error::NotLoggedIn`] before any I/O. A 401 tears the session down and
//! returns [`Error::Unauthenticated`]; nothing is retried.

use std::{
  path::Path,
  sync::{Mutex, PoisonError},
  time::Duration,
};

use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, StatusCode, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use smartflow_core::{
  lifecycle::{OfficerAction, Stage},
  notification::{NotificationBoard, NotificationList},
  request::{
    DecisionRequest, RequestList, SubmitResponse, UpdateRequest, UpdateSubmission,
    UploadResponse,
  },
  risk::RiskScore,
  session::{Credentials, LoginResponse, Session},
  store::SessionStore,
};
use tokio::task::JoinSet;

use crate::{Error, Result, inflight::InFlight, session::SessionContext};

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Server root; `/api` is appended.
  pub base_url: String,
  pub timeout:  Duration,
}

impl ClientConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), timeout: Duration::from_secs(30) }
  }
}

// ─── Uploads ─────────────────────────────────────────────────────────────────

/// What to do when some document uploads fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadPolicy {
  /// Submit with the documents that did upload.
  #[default]
  BestEffort,
  /// Abort before submitting if any upload failed.
  AllOrNothing,
}

/// A supporting document to upload alongside a submission.
#[derive(Debug, Clone)]
pub struct Document {
  pub filename: String,
  pub content:  Bytes,
}

impl Document {
  pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
    Self { filename: filename.into(), content: content.into() }
  }

  pub async fn from_path(path: &Path) -> Result<Self> {
    let content = tokio::fs::read(path).await.map_err(|source| Error::ReadDocument {
      path: path.display().to_string(),
      source,
    })?;
    let filename = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "document".to_owned());
    Ok(Self::new(filename, content))
  }
}

/// Outcome of [`ApiClient::submit_update`].
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
  pub request_id:    String,
  pub status:        String,
  pub risk_score:    Option<RiskScore>,
  pub auto_approved: bool,
  /// Ids of the documents attached to the submission, in input order.
  pub attached:      Vec<String>,
  /// Filenames whose upload failed.
  pub failed:        Vec<String>,
  pub requested:     usize,
}

impl SubmissionReceipt {
  pub fn stage(&self) -> Result<Stage> {
    Ok(Stage::resolve(&self.status, self.risk_score)?)
  }

  pub fn is_partial(&self) -> bool { !self.failed.is_empty() }

  /// E.g. `2 of 3 documents attached`.
  pub fn summary(&self) -> String {
    format!("{} of {} documents attached", self.attached.len(), self.requested)
  }
}

#[derive(Deserialize)]
struct Ack {
  #[serde(default)]
  message: Option<String>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct ApiClient<S> {
  http:      Client,
  base_url:  String,
  session:   SessionContext<S>,
  in_flight: InFlight,
  board:     Mutex<NotificationBoard>,
}

impl<S: SessionStore> ApiClient<S> {
  pub fn new(config: ClientConfig, session: SessionContext<S>) -> Result<Self> {
    let http = Client::builder().timeout(config.timeout).build()?;
    Ok(Self {
      http,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      session,
      in_flight: InFlight::new(),
      board: Mutex::new(NotificationBoard::default()),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}/api{}", self.base_url, path) }

  pub fn session(&self) -> &SessionContext<S> { &self.session }

  pub fn in_flight(&self) -> &InFlight { &self.in_flight }

  /// The current bearer token.
  fn bearer(&self) -> Result<String> { self.session.token().ok_or(Error::NotLoggedIn) }

  fn authed(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
    self.http.request(method, self.url(path)).bearer_auth(token)
  }

  /// Send a request authenticated with `token` and decode the body as `T`.
  async fn call<T: DeserializeOwned>(
    &self,
    req: RequestBuilder,
    token: &str,
    what: &str,
  ) -> Result<T> {
    tracing::debug!("{what}");
    let (status, body) = execute(req).await?;
    if status == StatusCode::UNAUTHORIZED {
      return Err(self.expire(token, what).await);
    }
    decode(status, &body)
  }

  /// Handle a 401 for a request sent with `token`. The session is only torn
  /// down while `token` is still the current one.
  pub(crate) async fn expire(&self, token: &str, what: &str) -> Error {
    match self.session.teardown_if(token).await {
      Ok(true) => tracing::warn!("{what}: token rejected, session cleared"),
      Ok(false) => tracing::debug!("{what}: superseded token rejected, session kept"),
      Err(e) => return e,
    }
    Error::Unauthenticated
  }

  // ── Auth ──────────────────────────────────────────────────────────────────

  /// `POST /api/auth/login`
  ///
  /// Credentials are checked locally first. On success the new session
  /// replaces any existing one.
  pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
    let body = credentials.to_request()?;
    let req = self.http.post(self.url("/auth/login")).json(&body);
    tracing::debug!(kind = %credentials.kind, "POST /auth/login");
    let (status, raw) = execute(req).await?;
    let resp: LoginResponse = decode(status, &raw)?;

    let session = Session { token: resp.token, kind: credentials.kind, profile: resp.user };
    self.session.establish(session.clone()).await?;
    Ok(session)
  }

  /// `POST /api/auth/logout`, best effort. The local session is always torn
  /// down.
  pub async fn logout(&self) -> Result<()> {
    if let Ok(token) = self.bearer() {
      match execute(self.authed(Method::POST, "/auth/logout", &token)).await {
        Ok((status, _)) if !status.is_success() => {
          tracing::debug!(%status, "server-side logout refused");
        }
        Err(e) => tracing::debug!("server-side logout failed: {e}"),
        Ok(_) => {}
      }
    }
    *self.board.lock().unwrap_or_else(PoisonError::into_inner) = NotificationBoard::default();
    self.session.teardown().await
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  /// `POST /api/documents/upload`
  pub async fn upload_document(&self, document: Document) -> Result<UploadResponse> {
    let token = self.bearer()?;
    let req = self
      .authed(Method::POST, "/documents/upload", &token)
      .multipart(upload_form(document));
    self.call(req, &token, "POST /documents/upload").await
  }

  // ── Requests ──────────────────────────────────────────────────────────────

  /// Upload `documents` concurrently, then `POST /api/updates/submit` with
  /// the ids that uploaded.
  pub async fn submit_update(
    &self,
    mut submission: UpdateSubmission,
    documents: Vec<Document>,
    policy: UploadPolicy,
  ) -> Result<SubmissionReceipt> {
    // Fail before any upload when there is no session.
    let token = self.bearer()?;
    let type_key: &'static str = submission.update_type.into();
    let _guard = self.in_flight.acquire("submit", type_key)?;

    let requested = documents.len();
    let mut uploads = JoinSet::new();
    for (index, document) in documents.into_iter().enumerate() {
      let filename = document.filename.clone();
      let req = self
        .authed(Method::POST, "/documents/upload", &token)
        .multipart(upload_form(document));
      uploads.spawn(async move { (index, filename, execute(req).await) });
    }

    let mut attached = Vec::new();
    let mut failed = Vec::new();
    let mut expired = false;
    while let Some(joined) = uploads.join_next().await {
      let Ok((index, filename, outcome)) = joined else {
        tracing::warn!("upload task aborted");
        continue;
      };
      let result = outcome.and_then(|(status, body)| {
        if status == StatusCode::UNAUTHORIZED {
          expired = true;
          return Err(Error::Unauthenticated);
        }
        decode::<UploadResponse>(status, &body)
      });
      match result {
        Ok(up) => attached.push((index, up.file_id)),
        Err(e) => {
          tracing::warn!(filename = %filename, "document upload failed: {e}");
          failed.push((index, filename));
        }
      }
    }
    if expired {
      return Err(self.expire(&token, "POST /documents/upload").await);
    }

    attached.sort_by_key(|(i, _)| *i);
    failed.sort_by_key(|(i, _)| *i);
    let attached: Vec<String> = attached.into_iter().map(|(_, id)| id).collect();
    let failed: Vec<String> = failed.into_iter().map(|(_, name)| name).collect();

    if policy == UploadPolicy::AllOrNothing && !failed.is_empty() {
      return Err(Error::UploadsFailed { failed });
    }

    submission.documents.extend(attached.iter().cloned());
    let req = self.authed(Method::POST, "/updates/submit", &token).json(&submission);
    let resp: SubmitResponse = self.call(req, &token, "POST /updates/submit").await?;
    tracing::info!(request_id = %resp.request_id, attached = attached.len(), requested, "submitted");

    Ok(SubmissionReceipt {
      request_id: resp.request_id,
      status: resp.status,
      risk_score: resp.risk_score,
      auto_approved: resp.auto_approved,
      attached,
      failed,
      requested,
    })
  }

  /// `GET /api/updates/{id}`
  pub async fn fetch_request(&self, request_id: &str) -> Result<UpdateRequest> {
    let path = format!("/updates/{request_id}");
    let token = self.bearer()?;
    let req = self.authed(Method::GET, &path, &token);
    self.call(req, &token, &format!("GET {path}")).await
  }

  /// `GET /api/updates/my-requests`. The result is cached in session
  /// storage. Officers are refused with 403.
  pub async fn list_my_requests(&self) -> Result<Vec<UpdateRequest>> {
    let token = self.bearer()?;
    let req = self.authed(Method::GET, "/updates/my-requests", &token);
    let list: RequestList = self.call(req, &token, "GET /updates/my-requests").await?;
    self.session.cache_requests(&list.requests).await?;
    Ok(list.requests)
  }

  // ── Officer ───────────────────────────────────────────────────────────────

  /// `GET /api/officer/pending-requests`: open requests, riskiest first.
  pub async fn pending_requests(&self) -> Result<Vec<UpdateRequest>> {
    let token = self.bearer()?;
    let req = self.authed(Method::GET, "/officer/pending-requests", &token);
    let list: RequestList = self.call(req, &token, "GET /officer/pending-requests").await?;
    Ok(list.requests)
  }

  /// `POST /api/officer/update-status`
  ///
  /// Returns the server's confirmation message.
  pub async fn decide(&self, request_id: &str, action: &OfficerAction) -> Result<String> {
    action.validate()?;
    let token = self.bearer()?;
    let _guard = self.in_flight.acquire(action.kind().as_str(), request_id)?;
    let body = DecisionRequest::new(request_id, action);
    let req = self.authed(Method::POST, "/officer/update-status", &token).json(&body);
    let ack: Ack = self
      .call(req, &token, "POST /officer/update-status")
      .await?;
    Ok(ack.message.unwrap_or_else(|| format!("{} recorded", action.kind())))
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  /// `GET /api/notifications`, merged into the local board. Read flags set
  /// locally survive the refresh.
  pub async fn refresh_notifications(&self) -> Result<NotificationBoard> {
    let token = self.bearer()?;
    let req = self.authed(Method::GET, "/notifications", &token);
    let list: NotificationList = self.call(req, &token, "GET /notifications").await?;
    let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
    board.merge(list.notifications);
    Ok(board.clone())
  }

  pub fn mark_notification_read(&self, id: u64) -> Result<()> {
    let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(board.mark_read(id)?)
  }

  pub fn mark_all_notifications_read(&self) {
    self
      .board
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .mark_all_read();
  }

  pub fn notifications(&self) -> NotificationBoard {
    self
      .board
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

// ─── Wire helpers ────────────────────────────────────────────────────────────

fn upload_form(document: Document) -> multipart::Form {
  let part = multipart::Part::bytes(document.content.to_vec()).file_name(document.filename);
  multipart::Form::new().part("file", part)
}

async fn execute(req: RequestBuilder) -> Result<(StatusCode, Bytes)> {
  let resp = req.send().await?;
  let status = resp.status();
  let body = resp.bytes().await?;
  Ok((status, body))
}

/// Decode a response body.
///
/// Error bodies surface their `message`, else their `error`, else a generic
/// message. Success bodies may be wrapped in `{"data": ...}`.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
  let malformed = |detail: String| Error::MalformedResponse { status: status.as_u16(), detail };
  let value: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;

  if !status.is_success() {
    let message = ["message", "error"]
      .iter()
      .find_map(|k| value.get(*k).and_then(Value::as_str))
      .filter(|m| !m.is_empty())
      .map(str::to_owned)
      .unwrap_or_else(|| format!("request failed with status {status}"));
    return Err(Error::Rejected { status: status.as_u16(), message });
  }

  let value = match value {
    Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
    other => other,
  };
  serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}
