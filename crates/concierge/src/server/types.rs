//! REST API types with schemars annotations

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::AnalyticsView;
use crate::error::ConciergeError;
use crate::history::HistoryEntry;

// Errors
// ======

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
  /// Human readable message
  pub error: String,

  /// Stable error key, see [`ConciergeError::key`]
  pub key: String,

  /// Request ID for log correlation
  pub transaction_id: Uuid,

  #[serde(skip)]
  status: u16,
}

impl ApiError {
  pub fn new(err: &ConciergeError, transaction_id: Uuid) -> Self {
    Self {
      error: err.to_string(),
      key: err.key().to_string(),
      transaction_id,
      status: status_for(err).as_u16(),
    }
  }

  pub fn status(&self) -> StatusCode {
    StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
  }
}

/// HTTP status for each error kind
pub fn status_for(err: &ConciergeError) -> StatusCode {
  match err {
    ConciergeError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
    ConciergeError::InvalidInput { .. } | ConciergeError::InvalidAnalysisType { .. } => {
      StatusCode::BAD_REQUEST
    }
    ConciergeError::RecordNotFound { .. }
    | ConciergeError::IoFailure { .. }
    | ConciergeError::BuildFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(self)).into_response()
  }
}

// Ask
// ===

/// Request for POST /ask
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AskRequest {
  /// Free-text question about a booking
  #[serde(default)]
  pub question: String,
}

// Analytics
// =========

/// Request for POST /analytics
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsRequest {
  /// One of revenue_trends, cancellation_rate, top_countries, lead_time_distribution
  #[serde(rename = "type", default)]
  pub analysis_type: String,
}

/// Response for POST /analytics: `{analysis, <type>: result, response_time}`
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsResponse {
  pub analysis: String,

  #[serde(flatten)]
  pub view: AnalyticsView,

  /// Wall time spent serving the request, e.g. "0.001 seconds"
  pub response_time: String,
}

// History
// =======

/// Query parameters for GET /history
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct HistoryQuery {
  /// Return only the newest N entries
  pub limit: Option<usize>,
}

/// Response for GET /history
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HistoryResponse {
  pub transaction_id: Uuid,
  pub entries: Vec<HistoryEntry>,
}

// Status
// ======

/// Response for GET /status
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  pub transaction_id: Uuid,

  /// "ready" once every resource is loaded, "failed" if a load failed, otherwise "loading"
  pub status: String,

  pub version: String,

  pub index_loaded: bool,

  pub analytics_loaded: bool,

  /// Records in the loaded corpus
  #[serde(skip_serializing_if = "Option::is_none")]
  pub records: Option<usize>,
}
