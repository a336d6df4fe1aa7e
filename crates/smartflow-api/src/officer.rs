//! Handlers for `/officer` endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};
use smartflow_core::request::{DecisionRequest, RequestList};

use crate::{auth::Bearer, backend::Backend, error::ApiError};

/// `GET /officer/pending-requests`, the review queue.
pub async fn pending_requests(
  State(backend): State<Arc<Backend>>,
  bearer: Bearer,
) -> Result<Json<RequestList>, ApiError> {
  Ok(Json(RequestList { requests: backend.pending_requests(&bearer.principal)? }))
}

/// `POST /officer/update-status`, body [`DecisionRequest`].
///
/// Answers 400 when the request is not under review or the action is
/// missing its reason.
pub async fn update_status(
  State(backend): State<Arc<Backend>>,
  bearer: Bearer,
  Json(body): Json<DecisionRequest>,
) -> Result<Json<Value>, ApiError> {
  backend.decide(&bearer.principal, &body)?;
  Ok(Json(json!({
    "success": true,
    "message": format!("{} recorded", body.action),
    "request_id": body.request_id,
  })))
}
