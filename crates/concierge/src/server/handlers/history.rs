use axum::{
  extract::{Extension, Query, State},
  response::Json as ResponseJson,
};
use std::sync::Arc;

use crate::context::AppContext;
use crate::server::middleware::RequestContext;
use crate::server::types::{ApiError, HistoryQuery, HistoryResponse};

/// GET /history - Recently answered questions, oldest first
pub async fn history(
  State(app): State<Arc<AppContext>>,
  Extension(context): Extension<RequestContext>,
  Query(query): Query<HistoryQuery>,
) -> Result<ResponseJson<HistoryResponse>, ApiError> {
  match app.history().recent(query.limit).await {
    Ok(entries) => Ok(ResponseJson(HistoryResponse { transaction_id: context.request_id, entries })),
    Err(e) => {
      context.log_error(&format!("Failed to read history: {e}"));
      Err(ApiError::new(&e, context.request_id))
    }
  }
}
