//! JSON body extractor answering with [`ApiError`] bodies

use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ConciergeError;
use crate::server::middleware::RequestContext;
use crate::server::types::ApiError;

/// Like [`Json`], but a missing, malformed or mistyped body is an
/// `invalid_input` error carrying the request ID
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
    let transaction_id = request
      .extensions()
      .get::<RequestContext>()
      .map(|context| context.request_id)
      .unwrap_or_else(Uuid::new_v4);

    match Json::<T>::from_request(request, state).await {
      Ok(Json(value)) => Ok(Self(value)),
      Err(rejection) => Err(ApiError::new(
        &ConciergeError::invalid_input(rejection.body_text()),
        transaction_id,
      )),
    }
  }
}
