use axum::{
  extract::{Extension, State},
  response::Json as ResponseJson,
};
use std::sync::Arc;
use std::time::Instant;

use crate::context::AppContext;
use crate::server::extract::ApiJson;
use crate::server::middleware::RequestContext;
use crate::server::types::{AnalyticsRequest, AnalyticsResponse, ApiError};

/// POST /analytics - One precomputed view by name
pub async fn analytics(
  State(app): State<Arc<AppContext>>,
  Extension(context): Extension<RequestContext>,
  ApiJson(request): ApiJson<AnalyticsRequest>,
) -> Result<ResponseJson<AnalyticsResponse>, ApiError> {
  let started = Instant::now();

  match app.analytics_view(&request.analysis_type) {
    Ok(view) => Ok(ResponseJson(AnalyticsResponse {
      analysis: request.analysis_type,
      view,
      response_time: format!("{:.3} seconds", started.elapsed().as_secs_f64()),
    })),
    Err(e) => {
      context.log_warn(&format!("Analytics '{}' failed: {e}", request.analysis_type));
      Err(ApiError::new(&e, context.request_id))
    }
  }
}
