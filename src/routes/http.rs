//! HTTP endpoint handlers for health and the OpenAI-backed features.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::openai::OpenAI;
use crate::planner::{compose_prompt, StudyPlanRequest};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut {
    status: "ok",
    services: ServicesOut {
      test_info: state.config.qnet_test_info_api.clone(),
      qualification: state.config.qnet_qualification_api.clone(),
      openai: if state.openai.is_some() { "enabled" } else { "disabled" },
      rag_backend: state.config.rag_backend_url.clone(),
    },
  })
}

fn openai_or_unavailable(state: &AppState) -> AppResult<&OpenAI> {
  state.openai.as_ref().ok_or_else(|| {
    AppError::Unavailable("OpenAI service is not available. Please set OPENAI_API_KEY.".into())
  })
}

#[instrument(level = "info", skip(state, body), fields(turns = body.messages.len()))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChatIn>,
) -> AppResult<Json<ChatOut>> {
  if body.messages.is_empty() {
    return Err(AppError::Validation("메시지(messages)가 비어 있습니다.".into()));
  }
  let oa = openai_or_unavailable(&state)?;
  let message = oa.chat(&state.prompts, &body.messages).await?;
  info!(target: "qpass_backend", reply_len = message.len(), "Chat reply served");
  Ok(Json(ChatOut { success: true, message }))
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.subject, start_date = %body.start_date))]
pub async fn http_post_study_plan(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudyPlanRequest>,
) -> AppResult<Json<StudyPlanOut>> {
  let oa = openai_or_unavailable(&state)?;
  body.validate()?;
  let prompt = compose_prompt(&state.prompts, &body);
  let study_plan = oa.study_plan(&state.prompts, &prompt).await?;
  info!(target: "qpass_backend", subject = %body.subject, plan_len = study_plan.len(), "Study plan generated");
  Ok(Json(StudyPlanOut {
    success: true,
    subject: body.subject,
    study_plan,
    exam_schedule: body.exam_schedule,
    start_date: body.start_date,
  }))
}
