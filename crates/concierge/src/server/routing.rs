//! Axum router configuration for all endpoints

use axum::{
  middleware,
  routing::{get, post},
  Router,
};
use std::sync::Arc;

use crate::context::AppContext;
use crate::server::handlers::{analytics, ask, history, status};
use crate::server::middleware::request_context_middleware;

/// Create the application router around a shared context
pub fn create_router(context: Arc<AppContext>) -> Router {
  Router::new()
    .route("/", get(status::home))
    .route("/status", get(status::status))
    .route("/ask", post(ask::ask))
    .route("/analytics", post(analytics::analytics))
    .route("/history", get(history::history))
    .layer(middleware::from_fn(request_context_middleware))
    .with_state(context)
}
