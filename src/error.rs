//! Error type shared by handlers and clients.
//!
//! Every failure ends up as a JSON body `{ "success": false, "error": "..." }`
//! with a status that tells the frontend whether retrying makes sense.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  /// Non-2xx or transport failure talking to Q-Net, OpenAI or the RAG backend.
  #[error("upstream {service} failed: {message}")]
  Upstream { service: &'static str, message: String },

  /// Upstream returned XML we could not parse.
  #[error("XML parse error: {0}")]
  XmlParse(String),

  /// A required parameter is missing; rejected before any network call.
  #[error("{0}")]
  Validation(String),

  /// Quiz batch came back empty or unsuccessful.
  #[error("quiz generation failed: {0}")]
  QuizGeneration(String),

  /// A backing service is not configured (e.g. no OPENAI_API_KEY).
  #[error("{0}")]
  Unavailable(String),

  #[error("{0}")]
  NotFound(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
    AppError::Upstream { service, message: message.into() }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Upstream { .. } | AppError::XmlParse(_) | AppError::QuizGeneration(_) => {
        StatusCode::BAD_GATEWAY
      }
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = json!({ "success": false, "error": self.to_string() });
    (status, Json(body)).into_response()
  }
}

impl From<roxmltree::Error> for AppError {
  fn from(e: roxmltree::Error) -> Self {
    AppError::XmlParse(e.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(e: std::io::Error) -> Self {
    AppError::Internal(e.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(e: serde_json::Error) -> Self {
    AppError::Internal(format!("JSON: {e}"))
  }
}

pub type AppResult<T> = Result<T, AppError>;
