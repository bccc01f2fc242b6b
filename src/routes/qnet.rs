//! Q-Net proxy: upstream status and raw XML pass through untouched.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::error::AppResult;
use crate::protocol::{JmQuery, QnetListQuery, QualificationQuery};
use crate::qnet::QnetOp;
use crate::state::AppState;

async fn passthrough(state: &AppState, op: QnetOp, params: &[(&str, Option<String>)]) -> AppResult<Response> {
  let (status, body) = state.qnet.request(op, params).await?;
  let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
  Ok((status, [(header::CONTENT_TYPE, "application/xml; charset=utf-8")], body).into_response())
}

async fn schedule_list(state: &AppState, op: QnetOp, q: QnetListQuery) -> AppResult<Response> {
  passthrough(state, op, &[("implYy", q.impl_yy), ("implSeq", q.impl_seq)]).await
}

#[instrument(level = "info", skip(state))]
pub async fn pe_list(State(state): State<Arc<AppState>>, Query(q): Query<QnetListQuery>) -> AppResult<Response> {
  schedule_list(&state, QnetOp::PeList, q).await
}

#[instrument(level = "info", skip(state))]
pub async fn mc_list(State(state): State<Arc<AppState>>, Query(q): Query<QnetListQuery>) -> AppResult<Response> {
  schedule_list(&state, QnetOp::McList, q).await
}

#[instrument(level = "info", skip(state))]
pub async fn e_list(State(state): State<Arc<AppState>>, Query(q): Query<QnetListQuery>) -> AppResult<Response> {
  schedule_list(&state, QnetOp::EList, q).await
}

#[instrument(level = "info", skip(state))]
pub async fn c_list(State(state): State<Arc<AppState>>, Query(q): Query<QnetListQuery>) -> AppResult<Response> {
  schedule_list(&state, QnetOp::CList, q).await
}

#[instrument(level = "info", skip(state))]
pub async fn fee_list(State(state): State<Arc<AppState>>, Query(q): Query<JmQuery>) -> AppResult<Response> {
  passthrough(&state, QnetOp::FeeList, &[("jmCd", q.jm_cd)]).await
}

#[instrument(level = "info", skip(state))]
pub async fn jm_list(State(state): State<Arc<AppState>>, Query(q): Query<JmQuery>) -> AppResult<Response> {
  passthrough(&state, QnetOp::JmList, &[("jmCd", q.jm_cd)]).await
}

#[instrument(level = "info", skip(state))]
pub async fn qualification_list(
  State(state): State<Arc<AppState>>,
  Query(q): Query<QualificationQuery>,
) -> AppResult<Response> {
  passthrough(&state, QnetOp::QualificationList, &[("gno", q.gno)]).await
}
