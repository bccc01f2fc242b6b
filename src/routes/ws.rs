//! WebSocket upgrade + quiz session loop.
//!
//! One `QuizDriver` per connection. The loop waits on either the next client
//! frame or the driver's own events (finished batch, refill deadline) and
//! sends every resulting output as its own JSON message.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::driver::QuizDriver;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::quiz::QuizEvent;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "qpass_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, Uuid::new_v4()))
}

/// Map a parsed client frame to either an immediate reply or a session event.
pub enum Dispatch {
  Reply(ServerWsMessage),
  Event(QuizEvent),
}

pub fn dispatch(msg: ClientWsMessage, default_batch: u32) -> Dispatch {
  match msg {
    ClientWsMessage::Ping => Dispatch::Reply(ServerWsMessage::Pong),
    ClientWsMessage::SubmitAnswer { answer } => Dispatch::Event(QuizEvent::AnswerSubmitted(answer)),
    ClientWsMessage::Retry => Dispatch::Event(QuizEvent::Retry),
    ClientWsMessage::NewSession => Dispatch::Event(QuizEvent::Reset),
    start @ ClientWsMessage::StartQuiz { .. } => match start.into_setup(default_batch) {
      Some(setup) if !setup.file_name.trim().is_empty() => Dispatch::Event(QuizEvent::StartRequested(setup)),
      _ => Dispatch::Reply(ServerWsMessage::Error { message: "fileName is required".into() }),
    },
  }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "qpass_backend", error = %e, "WS send error");
      false
    }
  }
}

#[instrument(level = "info", skip(socket, state), fields(%session_id))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, session_id: Uuid) {
  info!(target: "qpass_backend", "WebSocket connected");
  let mut driver = QuizDriver::new(state.quiz_source.clone(), state.quiz.lookahead, state.quiz.refill_timeout());

  loop {
    let event = tokio::select! {
      frame = socket.recv() => {
        let Some(Ok(msg)) = frame else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "qpass_backend", "WS received: {:?}", &incoming);
              match dispatch(incoming, state.quiz.default_batch_size) {
                Dispatch::Event(ev) => ev,
                Dispatch::Reply(reply) => {
                  if !send(&mut socket, &reply).await { break; }
                  continue;
                }
              }
            }
            Err(e) => {
              let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) };
              if !send(&mut socket, &reply).await { break; }
              continue;
            }
          },
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; continue; }
          Message::Close(_) => break,
          _ => continue,
        }
      }
      ev = driver.next_internal() => ev,
    };

    for output in driver.handle(event) {
      if !send(&mut socket, &ServerWsMessage::from(output)).await {
        info!(target: "qpass_backend", "WebSocket disconnected");
        return;
      }
    }
  }
  info!(target: "qpass_backend", "WebSocket disconnected");
}
