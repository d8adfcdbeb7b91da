//! Wires [`wharf_client::error::AppError`] into axum's response model.
//! Every handler in `api/*` returns `AppResult<T>`; this is the one
//! place the uniform `{code, message, request_id, details?}` envelope
//! (spec §7) is turned into an HTTP response, the same role the
//! teacher's `serror::Error` plays behind its `axum` feature.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use wharf_client::error::AppError;

pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
  fn from(e: AppError) -> Self {
    Self(e)
  }
}

impl From<anyhow::Error> for ApiError {
  fn from(e: anyhow::Error) -> Self {
    Self(e.into())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.0.kind.http_status())
      .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if self.0.kind.http_status() >= 500 {
      tracing::error!(kind = %self.0.kind, "{}", self.0.message());
    } else {
      tracing::warn!(kind = %self.0.kind, "{}", self.0.message());
    }
    (status, Json(self.0.envelope())).into_response()
  }
}
