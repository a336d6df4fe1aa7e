//! Integration tests for `ApiClient` against the in-memory reference API.

use std::{net::SocketAddr, sync::Arc};

use axum::http::StatusCode;
use smartflow_api::Backend;
use smartflow_core::{
  Error as CoreError,
  lifecycle::{ActionKind, OfficerAction, Stage},
  request::{UpdateSubmission, UpdateType},
  risk::{RiskBucket, RiskScore},
  session::Credentials,
  store::{SessionStore, StorageKey},
};
use smartflow_store_sqlite::SqliteSessionStore;

use crate::{ApiClient, ClientConfig, Document, Error, SessionContext, UploadPolicy};

const AADHAAR: &str = "123456789012";
const OFFICER: &str = "officer1@uidai.gov.in";
const PASSWORD: &str = "password123";

struct Harness {
  backend: Arc<Backend>,
  addr:    SocketAddr,
}

impl Harness {
  async fn start() -> Self {
    let backend = Backend::new();
    backend.add_citizen(AADHAAR, "Rahul Sharma", PASSWORD).unwrap();
    backend.add_officer("OFF001", OFFICER, "Rajesh Kumar", PASSWORD).unwrap();
    let backend = Arc::new(backend);
    let addr = smartflow_api::spawn(backend.clone()).await.unwrap();
    Self { backend, addr }
  }

  async fn client(&self) -> (ApiClient<SqliteSessionStore>, SqliteSessionStore) {
    let store = SqliteSessionStore::open_in_memory().await.unwrap();
    (self.client_on(store.clone()).await, store)
  }

  async fn client_on(&self, store: SqliteSessionStore) -> ApiClient<SqliteSessionStore> {
    let session = SessionContext::init(store).await.unwrap();
    ApiClient::new(ClientConfig::new(format!("http://{}", self.addr)), session).unwrap()
  }

  async fn citizen(&self) -> (ApiClient<SqliteSessionStore>, SqliteSessionStore) {
    let (client, store) = self.client().await;
    client.login(&Credentials::citizen(AADHAAR, PASSWORD)).await.unwrap();
    (client, store)
  }

  async fn officer(&self) -> ApiClient<SqliteSessionStore> {
    let (client, _) = self.client().await;
    client.login(&Credentials::officer(OFFICER, PASSWORD)).await.unwrap();
    client
  }

  fn calls_to(&self, call: &str) -> usize {
    self.backend.calls().iter().filter(|c| c.as_str() == call).count()
  }

  /// Submit a name change as the citizen and return its id.
  async fn submitted(&self, citizen: &ApiClient<SqliteSessionStore>) -> String {
    citizen
      .submit_update(
        UpdateSubmission::new(UpdateType::NameChange, "Rahul K Sharma"),
        Vec::new(),
        UploadPolicy::BestEffort,
      )
      .await
      .unwrap()
      .request_id
  }
}

fn docs() -> Vec<Document> {
  vec![
    Document::new("lease.pdf", &b"rent agreement"[..]),
    Document::new("bad.pdf", &b"corrupt"[..]),
    Document::new("bill.pdf", &b"electricity bill"[..]),
  ]
}

// ─── Uploads ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn partial_upload_failure_still_submits() {
  let h = Harness::start().await;
  h.backend.fail_uploads_named("bad.pdf");
  let (citizen, _) = h.citizen().await;

  let receipt = citizen
    .submit_update(
      UpdateSubmission::address("12 MG Road", "Bangalore", "Karnataka", "560001"),
      docs(),
      UploadPolicy::BestEffort,
    )
    .await
    .unwrap();

  assert_eq!(receipt.attached.len(), 2);
  assert_eq!(receipt.failed, vec!["bad.pdf".to_owned()]);
  assert_eq!(receipt.summary(), "2 of 3 documents attached");
  assert_eq!(h.calls_to("POST /api/documents/upload"), 3);

  let stored = h.backend.request(&receipt.request_id).unwrap();
  assert_eq!(stored.documents, receipt.attached);
  assert_eq!(
    stored.details[0].new_value.as_deref(),
    Some("12 MG Road, Bangalore, Karnataka - 560001")
  );
}

#[tokio::test]
async fn all_or_nothing_aborts_before_submitting() {
  let h = Harness::start().await;
  h.backend.fail_uploads_named("bad.pdf");
  let (citizen, _) = h.citizen().await;

  let err = citizen
    .submit_update(
      UpdateSubmission::new(UpdateType::AddressChange, "12 MG Road"),
      docs(),
      UploadPolicy::AllOrNothing,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, Error::UploadsFailed { ref failed } if failed == &["bad.pdf"]));
  assert_eq!(h.calls_to("POST /api/updates/submit"), 0);
  assert!(!citizen.in_flight().is_busy("submit", "address_change"));
}

#[tokio::test]
async fn all_or_nothing_submits_when_every_upload_succeeds() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;

  let receipt = citizen
    .submit_update(
      UpdateSubmission::new(UpdateType::AddressChange, "12 MG Road"),
      docs(),
      UploadPolicy::AllOrNothing,
    )
    .await
    .unwrap();
  assert_eq!(receipt.summary(), "3 of 3 documents attached");
  assert!(!receipt.is_partial());
}

#[tokio::test]
async fn single_upload_returns_file_id() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let up = citizen
    .upload_document(Document::new("proof.pdf", &b"%PDF-1.4"[..]))
    .await
    .unwrap();
  assert_eq!(up.file_id.len(), 16);
  assert_eq!(up.filename.as_deref(), Some("proof.pdf"));
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn calls_without_session_send_nothing() {
  let h = Harness::start().await;
  let (client, _) = h.client().await;

  assert!(matches!(client.list_my_requests().await, Err(Error::NotLoggedIn)));
  assert!(matches!(
    client.decide("REQ1", &OfficerAction::Approve).await,
    Err(Error::NotLoggedIn)
  ));
  let err = client
    .submit_update(
      UpdateSubmission::new(UpdateType::PhoneChange, "9876543210"),
      docs(),
      UploadPolicy::BestEffort,
    )
    .await
    .unwrap_err();
  assert!(err.is_auth());
  assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn invalid_credentials_are_refused_locally() {
  let h = Harness::start().await;
  let (client, _) = h.client().await;
  let err = client
    .login(&Credentials::citizen("12345", PASSWORD))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::InvalidCredentials(_))));
  assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn wrong_password_surfaces_server_message() {
  let h = Harness::start().await;
  let (client, store) = h.client().await;
  let err = client
    .login(&Credentials::citizen(AADHAAR, "not-the-password"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Rejected { status: 401, ref message } if message == "Invalid credentials"));
  assert!(!client.session().is_active());
  assert!(store.stored_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn logout_clears_every_key_and_blocks_further_calls() {
  let h = Harness::start().await;
  let (citizen, store) = h.citizen().await;
  h.submitted(&citizen).await;
  citizen.list_my_requests().await.unwrap();
  assert_eq!(store.stored_keys().await.unwrap().len(), 3);

  citizen.logout().await.unwrap();
  assert!(store.stored_keys().await.unwrap().is_empty());
  assert_eq!(h.calls_to("POST /api/auth/logout"), 1);

  let before = h.backend.calls().len();
  assert!(matches!(citizen.list_my_requests().await, Err(Error::NotLoggedIn)));
  assert_eq!(h.backend.calls().len(), before);
}

#[tokio::test]
async fn expired_token_tears_down_without_retry() {
  let h = Harness::start().await;
  let (citizen, store) = h.citizen().await;
  h.backend.revoke_all_tokens();

  let err = citizen.list_my_requests().await.unwrap_err();
  assert!(matches!(err, Error::Unauthenticated));
  assert_eq!(h.calls_to("GET /api/updates/my-requests"), 1);
  assert!(!citizen.session().is_active());
  for key in StorageKey::ALL {
    assert!(store.get(key).await.unwrap().is_none());
  }
}

#[tokio::test]
async fn expired_token_during_uploads_skips_submission() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  h.backend.revoke_all_tokens();

  let err = citizen
    .submit_update(
      UpdateSubmission::new(UpdateType::AddressChange, "12 MG Road"),
      docs(),
      UploadPolicy::BestEffort,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthenticated));
  assert_eq!(h.calls_to("POST /api/updates/submit"), 0);
  assert!(!citizen.session().is_active());
}

#[tokio::test]
async fn superseded_token_rejection_keeps_new_session() {
  let h = Harness::start().await;
  let (citizen, store) = h.citizen().await;
  let stale = citizen.session().token().unwrap();
  citizen.login(&Credentials::citizen(AADHAAR, PASSWORD)).await.unwrap();
  let fresh = citizen.session().token().unwrap();
  assert_ne!(stale, fresh);

  let err = citizen.expire(&stale, "GET /updates/my-requests").await;
  assert!(matches!(err, Error::Unauthenticated));
  assert_eq!(citizen.session().token().as_deref(), Some(fresh.as_str()));
  assert_eq!(store.get(StorageKey::AuthToken).await.unwrap(), Some(fresh.clone()));
  citizen.list_my_requests().await.unwrap();

  let err = citizen.expire(&fresh, "GET /updates/my-requests").await;
  assert!(matches!(err, Error::Unauthenticated));
  assert!(!citizen.session().is_active());
  assert!(store.get(StorageKey::AuthToken).await.unwrap().is_none());
}

#[tokio::test]
async fn session_survives_reopening_the_store() {
  let h = Harness::start().await;
  let path =
    std::env::temp_dir().join(format!("smartflow-client-{}.db", uuid::Uuid::new_v4()));

  let token = {
    let store = SqliteSessionStore::open(&path).await.unwrap();
    let client = h.client_on(store).await;
    client.login(&Credentials::citizen(AADHAAR, PASSWORD)).await.unwrap().token
  };

  let store = SqliteSessionStore::open(&path).await.unwrap();
  let client = h.client_on(store).await;
  let session = client.session().current().unwrap();
  assert_eq!(session.token, token);
  assert_eq!(session.profile.name, "Rahul Sharma");
  assert!(client.list_my_requests().await.unwrap().is_empty());

  let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn token_without_principal_is_not_a_session() {
  let store = SqliteSessionStore::open_in_memory().await.unwrap();
  store.put(StorageKey::AuthToken, "orphan".into()).await.unwrap();
  let ctx = SessionContext::init(store.clone()).await.unwrap();
  assert!(ctx.current().is_none());
  assert!(store.get(StorageKey::AuthToken).await.unwrap().is_none());
}

#[tokio::test]
async fn request_cache_holds_last_list() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let id = h.submitted(&citizen).await;
  citizen.list_my_requests().await.unwrap();

  h.backend.assess(&id, RiskScore::new(0.85).unwrap()).unwrap();
  let cached = citizen.session().cached_requests().await.unwrap();
  assert_eq!(cached.len(), 1);
  // The cache holds raw fields; the stage is resolved from them on read.
  assert_eq!(cached[0].stage().unwrap(), Stage::Submitted);
  let fresh = citizen.list_my_requests().await.unwrap();
  assert_eq!(fresh[0].stage().unwrap(), Stage::Review);
}

// ─── Officer decisions ───────────────────────────────────────────────────────

#[tokio::test]
async fn high_risk_request_goes_to_review_then_approval() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let id = h.submitted(&citizen).await;

  h.backend.assess(&id, RiskScore::new(0.85).unwrap()).unwrap();
  let request = citizen.fetch_request(&id).await.unwrap();
  assert_eq!(request.risk_bucket(), Some(RiskBucket::High));
  assert_eq!(request.stage().unwrap(), Stage::Review);
  assert_eq!(request.risk_score.unwrap().percent(), 85);

  let message = officer.decide(&id, &OfficerAction::Approve).await.unwrap();
  assert_eq!(message, "approve recorded");
  let request = officer.fetch_request(&id).await.unwrap();
  assert_eq!(request.stage().unwrap(), Stage::Approved);
}

#[tokio::test]
async fn low_risk_request_auto_approves() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let id = h.submitted(&citizen).await;

  h.backend.assess(&id, RiskScore::new(0.2).unwrap()).unwrap();
  let request = citizen.fetch_request(&id).await.unwrap();
  assert_eq!(request.stage().unwrap(), Stage::AutoApproved);
  assert!(request.stage().unwrap().is_terminal());
}

#[tokio::test]
async fn risky_auto_approval_is_a_contract_violation() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let id = h.submitted(&citizen).await;

  h.backend.assess(&id, RiskScore::new(0.85).unwrap()).unwrap();
  h.backend.set_status(&id, "auto_approved").unwrap();
  let request = citizen.fetch_request(&id).await.unwrap();
  assert!(matches!(
    request.stage(),
    Err(CoreError::ForbiddenAutoApproval { bucket: "High" })
  ));
}

#[tokio::test]
async fn decision_outside_review_surfaces_server_error() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let id = h.submitted(&citizen).await;

  let err = officer.decide(&id, &OfficerAction::Approve).await.unwrap_err();
  match err {
    Error::Rejected { status, message } => {
      assert_eq!(status, 400);
      assert_eq!(message, "cannot approve a request in stage submitted");
    }
    other => panic!("expected a rejection, got {other:?}"),
  }
  assert_eq!(h.backend.request(&id).unwrap().status, "submitted");
}

#[tokio::test]
async fn reject_without_reason_sends_nothing() {
  let h = Harness::start().await;
  let officer = h.officer().await;
  let before = h.backend.calls().len();

  let err = officer
    .decide("REQ1", &OfficerAction::Reject { reason: "   ".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MissingReason)));
  assert!(err.is_validation());
  assert_eq!(h.backend.calls().len(), before);
}

#[tokio::test]
async fn reject_records_reason() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let id = h.submitted(&citizen).await;
  h.backend.assess(&id, RiskScore::new(0.55).unwrap()).unwrap();

  officer
    .decide(&id, &OfficerAction::Reject { reason: "Gazette copy unreadable".into() })
    .await
    .unwrap();
  let request = citizen.fetch_request(&id).await.unwrap();
  assert_eq!(request.stage().unwrap(), Stage::Rejected);
  assert_eq!(request.officer_comment(), Some("Gazette copy unreadable"));
}

#[tokio::test]
async fn request_info_keeps_review_and_notifies() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let id = h.submitted(&citizen).await;
  h.backend.assess(&id, RiskScore::new(0.75).unwrap()).unwrap();

  let info = OfficerAction::RequestInfo { comment: "Upload a clearer ID".into() };
  officer.decide(&id, &info).await.unwrap();
  let request = citizen.fetch_request(&id).await.unwrap();
  assert_eq!(request.stage().unwrap(), Stage::Review);
  assert_eq!(request.officer_comment(), Some("Upload a clearer ID"));

  let board = citizen.refresh_notifications().await.unwrap();
  // One for the review routing, one for the information request.
  assert_eq!(board.items().len(), 2);
  assert_eq!(board.unread_count(), 2);
}

#[tokio::test]
async fn duplicate_decision_in_flight_is_refused() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let id = h.submitted(&citizen).await;
  h.backend.assess(&id, RiskScore::new(0.9).unwrap()).unwrap();

  let (first, second) = tokio::join!(
    officer.decide(&id, &OfficerAction::Approve),
    officer.decide(&id, &OfficerAction::Approve),
  );
  assert!(first.is_ok());
  assert!(matches!(
    second,
    Err(Error::AlreadyInFlight { action, ref key }) if action == ActionKind::Approve.as_str() && key == &id
  ));
  assert_eq!(h.calls_to("POST /api/officer/update-status"), 1);
  assert!(!officer.in_flight().is_busy("approve", &id));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn read_flags_survive_refresh() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let id = h.submitted(&citizen).await;
  h.backend.assess(&id, RiskScore::new(0.1).unwrap()).unwrap();

  let board = citizen.refresh_notifications().await.unwrap();
  assert_eq!(board.unread_count(), 1);
  let note = board.items()[0].id;
  citizen.mark_notification_read(note).unwrap();
  assert!(citizen.mark_notification_read(note + 100).is_err());

  let board = citizen.refresh_notifications().await.unwrap();
  assert_eq!(board.items().len(), 1);
  assert_eq!(board.unread_count(), 0);
}

// ─── Transport ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unparseable_response_is_a_network_error() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  h.backend.garble_responses(Some(StatusCode::BAD_GATEWAY));

  let err = citizen.list_my_requests().await.unwrap_err();
  assert!(err.is_network(), "{err:?}");
  assert!(citizen.session().is_active());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
  let store = SqliteSessionStore::open_in_memory().await.unwrap();
  let session = SessionContext::init(store).await.unwrap();
  // Port 9 (discard) on localhost is not served in test environments.
  let client = ApiClient::new(ClientConfig::new("http://127.0.0.1:9"), session).unwrap();
  let err = client
    .login(&Credentials::citizen(AADHAAR, PASSWORD))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn officer_queue_lists_open_requests_by_risk() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let medium = h.submitted(&citizen).await;
  let high = h.submitted(&citizen).await;
  let low = h.submitted(&citizen).await;
  h.backend.assess(&medium, RiskScore::new(0.55).unwrap()).unwrap();
  h.backend.assess(&high, RiskScore::new(0.85).unwrap()).unwrap();
  h.backend.assess(&low, RiskScore::new(0.2).unwrap()).unwrap();

  let queue = officer.pending_requests().await.unwrap();
  let ids: Vec<&str> = queue.iter().map(|r| r.request_id.as_str()).collect();
  assert_eq!(ids, vec![high.as_str(), medium.as_str()]);
  assert!(queue.iter().all(|r| r.stage().unwrap() == Stage::Review));
  assert_eq!(queue[0].user_name.as_deref(), Some("Rahul Sharma"));

  officer.decide(&high, &OfficerAction::Approve).await.unwrap();
  let queue = officer.pending_requests().await.unwrap();
  assert_eq!(queue.len(), 1);
  assert_eq!(queue[0].request_id, medium);
}

#[tokio::test]
async fn request_lists_are_refused_across_principals() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;

  let err = officer.list_my_requests().await.unwrap_err();
  assert!(matches!(err, Error::Rejected { status: 403, ref message } if message == "Unauthorized"));
  assert!(officer.session().is_active());

  let err = citizen.pending_requests().await.unwrap_err();
  assert!(
    matches!(err, Error::Rejected { status: 403, ref message } if message == "Officer access only")
  );
}

#[tokio::test]
async fn every_action_outside_review_is_refused() {
  let h = Harness::start().await;
  let (citizen, _) = h.citizen().await;
  let officer = h.officer().await;
  let id = h.submitted(&citizen).await;
  h.backend.assess(&id, RiskScore::new(0.3).unwrap()).unwrap();

  for action in [
    OfficerAction::Approve,
    OfficerAction::Reject { reason: "mismatch".into() },
    OfficerAction::RequestInfo { comment: "more proof".into() },
  ] {
    let err = officer.decide(&id, &action).await.unwrap_err();
    assert!(
      matches!(err, Error::Rejected { status: 400, .. }),
      "{} should be refused: {err:?}",
      action.kind()
    );
  }
  assert_eq!(h.backend.request(&id).unwrap().status, "auto_approved");
}

#[tokio::test]
async fn address_change_walkthrough() {
  let h = Harness::start().await;
  let (citizen, store) = h.client().await;
  citizen
    .login(&Credentials::citizen("1234 5678 9012", PASSWORD))
    .await
    .unwrap();
  assert!(store.get(StorageKey::AuthToken).await.unwrap().is_some());

  let receipt = citizen
    .submit_update(
      UpdateSubmission::address("12 MG Road", "Bangalore", "Karnataka", "560001"),
      Vec::new(),
      UploadPolicy::BestEffort,
    )
    .await
    .unwrap();
  assert_eq!(receipt.status, "submitted");
  assert!(receipt.request_id.starts_with("REQ"));

  h.backend
    .assess(&receipt.request_id, RiskScore::new(0.85).unwrap())
    .unwrap();
  let request = citizen.fetch_request(&receipt.request_id).await.unwrap();
  assert_eq!(request.risk_bucket(), Some(RiskBucket::High));
  assert_eq!(request.stage().unwrap(), Stage::Review);

  let officer = h.officer().await;
  let before = h.backend.calls().len();
  let err = officer
    .decide(&receipt.request_id, &OfficerAction::Reject { reason: String::new() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MissingReason)));
  assert_eq!(h.backend.calls().len(), before);
}
