use axum::{
  extract::{Extension, State},
  response::Json as ResponseJson,
};
use std::sync::Arc;

use crate::context::AppContext;
use crate::resolver::BookingProjection;
use crate::server::extract::ApiJson;
use crate::server::middleware::RequestContext;
use crate::server::types::{ApiError, AskRequest};

/// POST /ask - Closest booking to a free-text question
pub async fn ask(
  State(app): State<Arc<AppContext>>,
  Extension(context): Extension<RequestContext>,
  ApiJson(request): ApiJson<AskRequest>,
) -> Result<ResponseJson<BookingProjection>, ApiError> {
  match app.ask(&request.question).await {
    Ok(projection) => {
      context.log_info(&format!(
        "Resolved question to {} on {}",
        projection.hotel, projection.arrival_date
      ));
      Ok(ResponseJson(projection))
    }
    Err(e) => {
      context.log_warn(&format!("Question not answered: {e}"));
      Err(ApiError::new(&e, context.request_id))
    }
  }
}
