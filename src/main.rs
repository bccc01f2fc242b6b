//! Q-PASS · Qualification Exam Helper Backend
//!
//! - Axum HTTP + WebSocket API
//! - Q-Net exam-schedule proxy and normalized exam data (7-day disk cache)
//! - Optional OpenAI integration (chat, study plans)
//! - Quiz sessions over WebSocket, batches generated by the RAG backend
//! - Static SPA fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3001)
//!   QNET_SERVICE_KEY       : Q-Net OpenAPI service key
//!   QNET_TEST_INFO_API     : exam-information service base URL
//!   QNET_QUALIFICATION_API : qualification-list service base URL
//!   OPENAI_API_KEY         : enables OpenAI integration if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_MODEL           : default "gpt-3.5-turbo"
//!   RAG_BACKEND_URL        : default "http://localhost:8000"
//!   CACHE_DIR              : default "./cache"
//!   STATIC_DIR             : default "./static"
//!   QPASS_CONFIG_PATH      : path to TOML config (prompts + quiz tuning)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod cache;
mod config;
mod driver;
mod error;
mod openai;
mod planner;
mod protocol;
mod qnet;
mod quiz;
mod quiz_backend;
mod routes;
mod schedule;
mod state;
mod taxonomy;
mod telemetry;
mod util;
mod xml;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, Q-Net/OpenAI/RAG clients, cache.
  let state = Arc::new(AppState::new()?);
  let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));

  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "qpass_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "qpass_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "qpass_backend", "Shutdown signal received");
}
