//! Handler for `POST /documents/upload` (multipart field `file`).

use std::sync::Arc;

use axum::{
  Json,
  extract::{Multipart, State},
};
use smartflow_core::request::UploadResponse;

use crate::{auth::Bearer, backend::Backend, error::ApiError};

/// `POST /documents/upload`
pub async fn upload(
  State(backend): State<Arc<Backend>>,
  bearer: Bearer,
  mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(e.to_string()))?
  {
    if field.name() != Some("file") {
      continue;
    }
    let filename = field
      .file_name()
      .filter(|n| !n.is_empty())
      .ok_or_else(|| ApiError::BadRequest("No file selected".into()))?
      .to_owned();
    let content = field
      .bytes()
      .await
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    return Ok(Json(backend.store_document(&bearer.principal, &filename, content)?));
  }
  Err(ApiError::BadRequest("No file provided".into()))
}
