//! Welcome and status endpoint handlers

use axum::{
  extract::{Extension, State},
  response::Json,
};
use std::sync::Arc;

use crate::context::AppContext;
use crate::server::middleware::RequestContext;
use crate::server::types::StatusResponse;

pub const WELCOME: &str = "Welcome to the LLM-Powered Booking Analytics System!";

/// GET / - Static welcome text
pub async fn home() -> &'static str {
  WELCOME
}

/// GET /status - Whether startup loading has finished, and how
pub async fn status(
  State(app): State<Arc<AppContext>>,
  Extension(context): Extension<RequestContext>,
) -> Json<StatusResponse> {
  let resolver = app.resolver().ok();
  let status = if app.is_ready() {
    "ready"
  } else if app.load_failed() {
    "failed"
  } else {
    "loading"
  };

  Json(StatusResponse {
    transaction_id: context.request_id,
    status: status.to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    index_loaded: resolver.is_some(),
    analytics_loaded: app.analytics().is_ok(),
    records: resolver.map(|r| r.corpus().len()),
  })
}
