//! Bearer-token extractor and the `/auth` handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/login` | Body: [`LoginRequest`]; returns token + profile |
//! | `POST` | `/auth/logout` | Invalidates the presented token |

use std::sync::Arc;

use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, header, request::Parts},
};
use serde_json::{Value, json};
use smartflow_core::session::{LoginRequest, LoginResponse};

use crate::{
  backend::{Backend, Principal},
  error::ApiError,
};

/// Extract the raw token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// Present in a handler means the request carried a live token.
pub struct Bearer {
  pub principal: Principal,
  pub token:     String,
}

impl FromRequestParts<Arc<Backend>> for Bearer {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    backend: &Arc<Backend>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)
      .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;
    let principal = backend
      .authenticate(token)
      .ok_or_else(|| ApiError::Unauthorized("Token expired or invalid".into()))?;
    Ok(Bearer { principal, token: token.to_owned() })
  }
}

/// `POST /auth/login`
pub async fn login(
  State(backend): State<Arc<Backend>>,
  Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
  Ok(Json(backend.login(&body)?))
}

/// `POST /auth/logout`
pub async fn logout(State(backend): State<Arc<Backend>>, bearer: Bearer) -> Json<Value> {
  backend.logout(&bearer.token);
  Json(json!({ "success": true }))
}
