//! Runtime configuration: environment variables plus an optional TOML file
//! (prompt overrides and quiz tuning).
//!
//! See `AgentConfig`, `Prompts` and `QuizTuning` for the TOML schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_TEST_INFO_API: &str =
  "http://openapi.q-net.or.kr/api/service/rest/InquiryTestInformationNTQSVC";
pub const DEFAULT_QUALIFICATION_API: &str =
  "http://openapi.q-net.or.kr/api/service/rest/InquiryListNationalQualifcationSVC";

/// Service endpoints and paths, all from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
  pub port: u16,
  pub qnet_test_info_api: String,
  pub qnet_qualification_api: String,
  /// Never logged.
  pub qnet_service_key: Option<String>,
  pub rag_backend_url: String,
  pub cache_dir: String,
  pub static_dir: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      port: 3001,
      qnet_test_info_api: DEFAULT_TEST_INFO_API.into(),
      qnet_qualification_api: DEFAULT_QUALIFICATION_API.into(),
      qnet_service_key: None,
      rag_backend_url: "http://localhost:8000".into(),
      cache_dir: "./cache".into(),
      static_dir: "./static".into(),
    }
  }
}

impl ServerConfig {
  pub fn from_env() -> Self {
    let d = Self::default();
    let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
    Self {
      port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(d.port),
      qnet_test_info_api: var("QNET_TEST_INFO_API").unwrap_or(d.qnet_test_info_api),
      qnet_qualification_api: var("QNET_QUALIFICATION_API").unwrap_or(d.qnet_qualification_api),
      qnet_service_key: var("QNET_SERVICE_KEY"),
      rag_backend_url: var("RAG_BACKEND_URL").unwrap_or(d.rag_backend_url),
      cache_dir: var("CACHE_DIR").unwrap_or(d.cache_dir),
      static_dir: var("STATIC_DIR").unwrap_or(d.static_dir),
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub quiz: QuizTuning,
}

/// Quiz refill behavior.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizTuning {
  /// Start the next batch once the answered index is this close to the end.
  pub lookahead: usize,
  /// How long an exhausted session waits for a refill before stalling.
  pub refill_timeout_secs: u64,
  pub default_batch_size: u32,
}

impl Default for QuizTuning {
  fn default() -> Self {
    Self { lookahead: 3, refill_timeout_secs: 30, default_batch_size: 5 }
  }
}

impl QuizTuning {
  pub fn refill_timeout(&self) -> Duration {
    Duration::from_secs(self.refill_timeout_secs)
  }
}

/// Prompts used by the OpenAI client. Defaults target Korean qualification
/// exam coaching; override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub chat_system: String,
  pub study_plan_system: String,
  /// Placeholders: {subject}, {schedule_info}, {study_period_info}
  pub study_plan_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      chat_system: "당신은 친절하고 전문적인 학습 도우미 AI입니다.\n\n\
주요 역할:\n\
- 국가기술자격 시험 준비에 대한 조언 제공\n\
- 학습 계획 수립 도움\n\
- 시험 준비 방법 안내\n\
- 학습 동기 부여 및 격려\n\n\
답변 스타일:\n\
- 친근하고 이해하기 쉬운 언어 사용\n\
- 구체적이고 실용적인 조언 제공\n\
- 필요시 단계별로 설명\n\n\
한국어로 답변해주세요."
        .into(),
      study_plan_system: "당신은 국가기술자격 시험 전문 학습 컨설턴트입니다. 수험생들이 효율적으로 시험을 준비할 수 있도록 구체적이고 실용적인 조언을 제공합니다. 주어진 학습 기간에 맞춰 현실적이고 실천 가능한 일정을 제시합니다.".into(),
      study_plan_user_template: "당신은 국가기술자격 시험 전문 학습 컨설턴트입니다.\n\n\
시험 종목: {subject}\n\n\
시험 일정:\n{schedule_info}\n{study_period_info}\n\n\
위 정보를 바탕으로 수험생을 위한 맞춤형 학습 계획을 작성해주세요.\n\n\
다음 내용을 반드시 포함해주세요:\n\n\
1. **시험 개요 및 난이도 분석**\n\
2. **필기시험 준비 전략** (주요 과목, 출제 경향, 추천 교재)\n\
3. **실기시험 준비 전략** (과제 유형, 실습 방법, 주의사항)\n\
4. **주차별 상세 학습 계획** (공부 시작일부터 시험일까지, D-7/D-3/D-1 전략 포함)\n\
5. **최종 마무리 전략** (시험 직전 준비사항, 준비물, 당일 유의사항)\n\n\
학습 기간을 고려하여 현실적이고 실천 가능한 계획을 한국어로 구체적으로 작성해주세요."
        .into(),
    }
  }
}

/// Attempt to load `AgentConfig` from QPASS_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("QPASS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "qpass_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "qpass_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "qpass_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
