//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and take plain text back: the tutoring chat
//! and the study-plan generator. Calls are instrumented and log model names,
//! latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

/// One chat turn as the frontend sends it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".into());

    // Study plans run to ~2500 tokens; give them room.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(90))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  #[instrument(level = "info", skip(self, messages), fields(model = %self.model, turns = messages.len()))]
  async fn chat_plain(
    &self,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
  ) -> AppResult<String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages,
      temperature,
      max_tokens: Some(max_tokens),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "qpass-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| AppError::upstream("openai", e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      error!(%status, elapsed = ?start.elapsed(), "OpenAI call failed");
      return Err(AppError::upstream("openai", format!("HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| AppError::upstream("openai", e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    if text.is_empty() {
      return Err(AppError::upstream("openai", "empty completion"));
    }
    Ok(text)
  }

  /// Tutoring chat: system prompt + the conversation so far.
  pub async fn chat(&self, prompts: &Prompts, history: &[ChatMessage]) -> AppResult<String> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage { role: "system".into(), content: prompts.chat_system.clone() });
    messages.extend(history.iter().cloned());
    self.chat_plain(messages, 0.8, 1000).await
  }

  /// Study plan from an already-composed user prompt.
  pub async fn study_plan(&self, prompts: &Prompts, user_prompt: &str) -> AppResult<String> {
    let messages = vec![
      ChatMessage { role: "system".into(), content: prompts.study_plan_system.clone() },
      ChatMessage { role: "user".into(), content: user_prompt.to_string() },
    ];
    self.chat_plain(messages, 0.7, 2500).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessage>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Incorrect API key provided"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn request_omits_missing_max_tokens() {
    let req = ChatCompletionRequest {
      model: "m".into(),
      messages: vec![ChatMessage { role: "user".into(), content: "안녕".into() }],
      temperature: 0.8,
      max_tokens: None,
    };
    let v = serde_json::to_value(&req).unwrap();
    assert!(v.get("max_tokens").is_none());
    assert_eq!(v["messages"][0]["content"], "안녕");
  }
}
