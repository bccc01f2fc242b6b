//! Pass-through to the RAG/quiz backend for `/api/quiz`, `/api/rag`, `/api/pdf`
//! and `/api/openai/chat-with-file`.
//!
//! Method, path, query, content type and body go out as received; status,
//! content type and body come back the same way. PDF uploads arrive as
//! multipart and are forwarded as opaque bytes with their boundary intact.

use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::State,
  http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
  response::{IntoResponse, Response},
};
use tracing::{error, info, instrument};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Uploads are PDFs; keep well above typical lecture notes.
pub const FORWARD_BODY_LIMIT: usize = 50 * 1024 * 1024;

pub fn target_url(base: &str, uri: &Uri) -> String {
  let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
  format!("{}{}", base.trim_end_matches('/'), path)
}

#[instrument(level = "info", skip(state, headers, body), fields(%method, path = %uri.path(), body_len = body.len()))]
pub async fn forward(
  State(state): State<Arc<AppState>>,
  method: Method,
  uri: Uri,
  headers: HeaderMap,
  body: Bytes,
) -> AppResult<Response> {
  let url = target_url(&state.config.rag_backend_url, &uri);
  let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
    .map_err(|e| AppError::Validation(e.to_string()))?;

  let mut req = state.http.request(method, &url);
  for name in [header::CONTENT_TYPE, header::ACCEPT] {
    if let Some(v) = headers.get(&name).and_then(|v| v.to_str().ok()) {
      req = req.header(name.as_str(), v);
    }
  }
  if !body.is_empty() {
    req = req.body(body.to_vec());
  }

  let res = req.send().await.map_err(|e| {
    error!(target: "qpass_backend", %url, error = %e, "RAG backend unreachable");
    AppError::upstream("rag", e.to_string())
  })?;

  let status = StatusCode::from_u16(res.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
  let content_type = res
    .headers()
    .get(reqwest::header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| HeaderValue::from_str(v).ok())
    .unwrap_or_else(|| HeaderValue::from_static("application/json"));
  let bytes = res.bytes().await.map_err(|e| AppError::upstream("rag", e.to_string()))?;
  info!(target: "qpass_backend", %url, status = status.as_u16(), len = bytes.len(), "RAG backend response");

  Ok((status, [(header::CONTENT_TYPE, content_type)], bytes.to_vec()).into_response())
}
