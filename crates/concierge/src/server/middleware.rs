//! Request context middleware
//!
//! Every request gets a [`RequestContext`] in its extensions carrying a fresh
//! request ID, which handlers use as the response transaction ID.

use axum::{
  extract::Request,
  http::{HeaderMap, Method, Uri},
  middleware::Next,
  response::Response,
};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct RequestContext {
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
  pub headers: HeaderMap,
}

impl RequestContext {
  pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
    Self { request_id: Uuid::new_v4(), method, uri, headers }
  }

  fn user_agent(&self) -> &str {
    self.headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("none")
  }

  pub fn log_info(&self, message: &str) {
    info!(request_id = %self.request_id, "{} {} - {}", self.method, self.uri.path(), message);
  }

  pub fn log_warn(&self, message: &str) {
    warn!(request_id = %self.request_id, "{} {} - {}", self.method, self.uri.path(), message);
  }

  pub fn log_error(&self, message: &str) {
    error!(request_id = %self.request_id, "{} {} - {}", self.method, self.uri.path(), message);
  }

  pub fn log_request_start(&self) {
    info!(
      request_id = %self.request_id,
      "{} {} - Request started (User-Agent: {})",
      self.method,
      self.uri.path(),
      self.user_agent()
    );
  }

  pub fn log_request_complete(&self, status_code: u16, duration_ms: f64) {
    info!(
      request_id = %self.request_id,
      "{} {} - Request completed (Status: {}, Duration: {:.2}ms)",
      self.method,
      self.uri.path(),
      status_code,
      duration_ms
    );
  }
}

/// Inject a [`RequestContext`] and log request start and completion
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
  let context = RequestContext::new(
    request.method().clone(),
    request.uri().clone(),
    request.headers().clone(),
  );

  let start_time = std::time::Instant::now();
  context.log_request_start();

  request.extensions_mut().insert(context.clone());
  let response = next.run(request).await;

  let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
  context.log_request_complete(response.status().as_u16(), duration_ms);

  response
}
