//! Batch question generation through the external document/RAG backend.
//!
//! The backend owns PDF ingestion and the Gemini calls; we only know its
//! `/api/quiz/generate-from-uploaded` contract:
//!   request  `{file_name, num_questions, difficulty, question_type}`
//!   response `{success, questions: [...], file_name, total_questions}`
//!
//! `QuizSource` is the seam the WebSocket driver depends on, so tests can
//! feed batches without a backend.

use std::{future::Future, pin::Pin, time::Duration};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::{AppError, AppResult};
use crate::quiz::{QuizQuestion, QuizSetup};

pub type GenerateFuture = Pin<Box<dyn Future<Output = AppResult<Vec<QuizQuestion>>> + Send>>;

pub trait QuizSource: Send + Sync {
  fn generate(&self, setup: QuizSetup) -> GenerateFuture;
}

#[derive(Clone)]
pub struct RagQuizBackend {
  pub client: reqwest::Client,
  pub base_url: String,
}

#[derive(Serialize)]
struct GenerateReq<'a> {
  file_name: &'a str,
  num_questions: u32,
  difficulty: &'a str,
  question_type: &'a str,
}

impl RagQuizBackend {
  pub fn new(base_url: String) -> AppResult<Self> {
    // Gemini reads the whole PDF per batch; keep well above its usual latency.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Self { client, base_url })
  }

  #[instrument(level = "info", skip(self), fields(file = %setup.file_name, n = setup.num_questions))]
  pub async fn generate_batch(&self, setup: &QuizSetup) -> AppResult<Vec<QuizQuestion>> {
    let url = format!("{}/api/quiz/generate-from-uploaded", self.base_url.trim_end_matches('/'));
    let req = GenerateReq {
      file_name: &setup.file_name,
      num_questions: setup.num_questions,
      difficulty: &setup.difficulty,
      question_type: &setup.question_type,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "qpass-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await
      .map_err(|e| AppError::upstream("quiz", e.to_string()))?;

    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
      let detail = body.get("detail").and_then(Value::as_str).unwrap_or("no detail");
      error!(target: "quiz", %status, detail, "Quiz backend returned an error");
      return Err(AppError::QuizGeneration(format!("HTTP {status}: {detail}")));
    }

    let questions = parse_batch(&body)?;
    info!(target: "quiz", elapsed = ?start.elapsed(), count = questions.len(), "Quiz batch received");
    Ok(questions)
  }
}

impl QuizSource for RagQuizBackend {
  fn generate(&self, setup: QuizSetup) -> GenerateFuture {
    let this = self.clone();
    Box::pin(async move { this.generate_batch(&setup).await })
  }
}

/// Accepts `{success, questions}`, `{questions}` or a bare array. Answers
/// may arrive as numbers (option index) and are kept as text.
pub fn parse_batch(body: &Value) -> AppResult<Vec<QuizQuestion>> {
  if body.get("success").and_then(Value::as_bool) == Some(false) {
    let msg = body
      .get("error")
      .or_else(|| body.get("detail"))
      .and_then(Value::as_str)
      .unwrap_or("unsuccessful response");
    return Err(AppError::QuizGeneration(msg.to_string()));
  }

  let list = match body {
    Value::Array(items) => items,
    _ => match body.get("questions") {
      Some(Value::Array(items)) => items,
      _ => return Err(AppError::QuizGeneration("response has no questions".into())),
    },
  };

  let questions: Vec<QuizQuestion> = list.iter().filter_map(question_from_value).collect();
  if questions.is_empty() {
    return Err(AppError::QuizGeneration("empty batch".into()));
  }
  Ok(questions)
}

fn text_of(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(if *b { "참".into() } else { "거짓".into() }),
    _ => None,
  }
}

fn question_from_value(v: &Value) -> Option<QuizQuestion> {
  let question = v.get("question").and_then(Value::as_str)?.to_string();
  let answer = v.get("answer").and_then(text_of)?;
  let options = v
    .get("options")
    .and_then(Value::as_array)
    .map(|xs| xs.iter().filter_map(text_of).collect())
    .unwrap_or_default();
  let explanation = v.get("explanation").and_then(Value::as_str).map(str::to_string);
  Some(QuizQuestion { question, options, answer, explanation })
}
