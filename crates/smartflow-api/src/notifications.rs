//! Handler for `GET /notifications`.

use std::sync::Arc;

use axum::{Json, extract::State};
use smartflow_core::notification::NotificationList;

use crate::{auth::Bearer, backend::Backend};

/// `GET /notifications`
pub async fn list(State(backend): State<Arc<Backend>>, bearer: Bearer) -> Json<NotificationList> {
  Json(NotificationList { notifications: backend.notifications_for(&bearer.principal) })
}
