//! Application state shared by every handler and WebSocket session.
//!
//! This module owns:
//!   - server config (endpoints, paths) and the TOML-backed prompts/quiz tuning
//!   - the Q-Net client and the on-disk exam cache
//!   - optional OpenAI client
//!   - the quiz batch source and a plain HTTP client for RAG forwarding
//!
//! Everything here is immutable after startup; the cache lives on disk.

use std::{sync::Arc, time::Duration};

use tracing::{info, instrument, warn};

use crate::cache::ExamCache;
use crate::config::{load_agent_config_from_env, Prompts, QuizTuning, ServerConfig};
use crate::error::{AppError, AppResult};
use crate::openai::OpenAI;
use crate::qnet::QnetClient;
use crate::quiz_backend::{QuizSource, RagQuizBackend};

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub prompts: Prompts,
    pub quiz: QuizTuning,
    pub qnet: QnetClient,
    pub openai: Option<OpenAI>,
    pub cache: ExamCache,
    pub quiz_source: Arc<dyn QuizSource>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Build state from env: load config, init clients.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> AppResult<Self> {
        let config = ServerConfig::from_env();
        let agent = load_agent_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "qpass_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            warn!(target: "qpass_backend", "OpenAI disabled (no OPENAI_API_KEY). Chat and study plans return 503.");
        }

        let quiz_source: Arc<dyn QuizSource> = Arc::new(RagQuizBackend::new(config.rag_backend_url.clone())?);
        Self::with_parts(config, agent.prompts, agent.quiz, openai, quiz_source)
    }

    /// Assemble state around an explicit quiz source and OpenAI client.
    pub fn with_parts(
        config: ServerConfig,
        prompts: Prompts,
        quiz: QuizTuning,
        openai: Option<OpenAI>,
        quiz_source: Arc<dyn QuizSource>,
    ) -> AppResult<Self> {
        let qnet = QnetClient::new(&config)?;
        if !qnet.has_service_key() {
            warn!(target: "qpass_backend", "QNET_SERVICE_KEY not set; Q-Net calls will be rejected upstream.");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let cache = ExamCache::new(&config.cache_dir);

        info!(
            target: "qpass_backend",
            cache_dir = %config.cache_dir,
            rag_backend = %config.rag_backend_url,
            lookahead = quiz.lookahead,
            refill_timeout_secs = quiz.refill_timeout_secs,
            "Application state ready"
        );

        Ok(Self { config, prompts, quiz, qnet, openai, cache, quiz_source, http })
    }
}
