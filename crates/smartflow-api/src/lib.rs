//! In-memory reference implementation of the SmartFlow update-request API.
//!
//! Exposes an axum [`Router`] over a [`Backend`] that honours the same JSON
//! contract as the production server. The client crate runs its integration
//! tests against it; the `mock-server` binary serves it for local use.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = smartflow_api::app(Arc::new(Backend::new()));
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod backend;
pub mod documents;
pub mod error;
pub mod notifications;
pub mod officer;
pub mod updates;

use std::{net::SocketAddr, sync::Arc};

use axum::{
  Router,
  extract::{Request, State},
  middleware::{self, Next},
  response::{Html, IntoResponse, Response},
  routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use backend::Backend;
pub use error::ApiError;

/// Build the `/api` routes for `backend`, without the `/api` prefix.
pub fn api_router(backend: Arc<Backend>) -> Router<()> {
  Router::new()
    // Auth
    .route("/auth/login", post(auth::login))
    .route("/auth/logout", post(auth::logout))
    // Requests
    .route("/updates/submit", post(updates::submit))
    .route("/updates/my-requests", get(updates::my_requests))
    .route("/updates/{id}", get(updates::get_one))
    // Documents
    .route("/documents/upload", post(documents::upload))
    // Officer
    .route("/officer/pending-requests", get(officer::pending_requests))
    .route("/officer/update-status", post(officer::update_status))
    // Notifications
    .route("/notifications", get(notifications::list))
    .with_state(backend)
}

/// The full application: routes nested under `/api`, call recording, and
/// HTTP tracing.
pub fn app(backend: Arc<Backend>) -> Router {
  Router::new()
    .nest("/api", api_router(backend.clone()))
    .layer(middleware::from_fn_with_state(backend, track))
    .layer(TraceLayer::new_for_http())
}

/// Record every call; answer with a non-JSON body while garbling is on.
async fn track(State(backend): State<Arc<Backend>>, req: Request, next: Next) -> Response {
  backend.record_call(format!("{} {}", req.method(), req.uri().path()));
  if let Some(status) = backend.garbled() {
    return (status, Html("<html><body>upstream unavailable</body></html>")).into_response();
  }
  next.run(req).await
}

/// Serve `backend` on an ephemeral localhost port in the background and
/// return the bound address.
pub async fn spawn(backend: Arc<Backend>) -> std::io::Result<SocketAddr> {
  let listener = TcpListener::bind("127.0.0.1:0").await?;
  let addr = listener.local_addr()?;
  let app = app(backend);
  tokio::spawn(async move {
    if let Err(e) = axum::serve(listener, app).await {
      tracing::error!("reference API stopped: {e}");
    }
  });
  Ok(addr)
}
