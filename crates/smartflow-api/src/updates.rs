//! Handlers for `/updates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/updates/submit` | Body: [`UpdateSubmission`]; returns 201 |
//! | `GET`  | `/updates/my-requests` | The caller's requests, newest first; citizens only |
//! | `GET`  | `/updates/{id}` | Citizens may only read their own |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use smartflow_core::request::{RequestList, UpdateRequest, UpdateSubmission};

use crate::{auth::Bearer, backend::Backend, error::ApiError};

/// `POST /updates/submit`
pub async fn submit(
  State(backend): State<Arc<Backend>>,
  bearer: Bearer,
  Json(body): Json<UpdateSubmission>,
) -> Result<impl IntoResponse, ApiError> {
  let resp = backend.submit(&bearer.principal, body)?;
  Ok((StatusCode::CREATED, Json(resp)))
}

/// `GET /updates/my-requests`
pub async fn my_requests(
  State(backend): State<Arc<Backend>>,
  bearer: Bearer,
) -> Result<Json<RequestList>, ApiError> {
  Ok(Json(RequestList { requests: backend.list_requests(&bearer.principal)? }))
}

/// `GET /updates/{id}`
pub async fn get_one(
  State(backend): State<Arc<Backend>>,
  bearer: Bearer,
  Path(id): Path<String>,
) -> Result<Json<UpdateRequest>, ApiError> {
  Ok(Json(backend.get_request(&bearer.principal, &id)?))
}
