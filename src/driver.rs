//! Runs a `QuizSession`'s effects on tokio.
//!
//! - `Effect::Generate` spawns a task on the shared `QuizSource`; the result
//!   comes back as a `BatchLoaded`/`BatchFailed` event on an mpsc channel.
//! - `Effect::ArmRefillWait` sets a single deadline; `CancelRefillWait`
//!   drops it. When it fires the session gets `RefillTimedOut` and nothing is
//!   re-armed until the user retries.
//!
//! The socket loop `select!`s between client frames and `next_internal`.

use std::{pin::Pin, sync::Arc, time::Duration};

use tokio::{
  sync::mpsc,
  time::{sleep, Sleep},
};
use tracing::{debug, instrument};

use crate::quiz::{Effect, Output, QuizEvent, QuizSession};
use crate::quiz_backend::QuizSource;

pub struct QuizDriver {
  session: QuizSession,
  source: Arc<dyn QuizSource>,
  results_tx: mpsc::UnboundedSender<QuizEvent>,
  results_rx: mpsc::UnboundedReceiver<QuizEvent>,
  refill_wait: Option<Pin<Box<Sleep>>>,
  refill_timeout: Duration,
}

impl QuizDriver {
  pub fn new(source: Arc<dyn QuizSource>, lookahead: usize, refill_timeout: Duration) -> Self {
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    Self {
      session: QuizSession::new(lookahead),
      source,
      results_tx,
      results_rx,
      refill_wait: None,
      refill_timeout,
    }
  }

  #[cfg(test)]
  pub fn session(&self) -> &QuizSession {
    &self.session
  }

  #[cfg(test)]
  pub fn is_waiting_for_refill(&self) -> bool {
    self.refill_wait.is_some()
  }

  /// Apply one event and run its effects. Returns what to show the user.
  #[instrument(level = "debug", skip(self), fields(mode = ?self.session.mode()))]
  pub fn handle(&mut self, event: QuizEvent) -> Vec<Output> {
    let step = self.session.handle(event);
    for effect in step.effects {
      match effect {
        Effect::Generate { epoch, setup } => {
          let source = self.source.clone();
          let tx = self.results_tx.clone();
          debug!(target: "quiz", epoch, "Spawning batch generation");
          tokio::spawn(async move {
            let ev = match source.generate(setup).await {
              Ok(questions) => QuizEvent::BatchLoaded { epoch, questions },
              Err(e) => QuizEvent::BatchFailed { epoch, reason: e.to_string() },
            };
            // Receiver gone means the socket closed; nothing to deliver to.
            let _ = tx.send(ev);
          });
        }
        Effect::ArmRefillWait => {
          if self.refill_wait.is_none() {
            self.refill_wait = Some(Box::pin(sleep(self.refill_timeout)));
          }
        }
        Effect::CancelRefillWait => {
          self.refill_wait = None;
        }
      }
    }
    step.outputs
  }

  /// Next event produced by the driver itself: a finished generation or the
  /// refill deadline. Pending forever when neither can happen.
  pub async fn next_internal(&mut self) -> QuizEvent {
    let Self { results_rx, refill_wait, .. } = self;
    let deadline = async {
      match refill_wait.as_mut() {
        Some(wait) => wait.as_mut().await,
        None => std::future::pending::<()>().await,
      }
    };
    let finished = tokio::select! {
      Some(ev) = results_rx.recv() => Some(ev),
      _ = deadline => None,
    };
    match finished {
      Some(ev) => ev,
      None => {
        self.refill_wait = None;
        QuizEvent::RefillTimedOut
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::AppError;
  use crate::quiz::{Mode, QuizQuestion, QuizSetup};
  use crate::quiz_backend::GenerateFuture;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Returns `per_batch` questions after `delay`; `None` never answers.
  struct FakeSource {
    delay: Option<Duration>,
    per_batch: usize,
    calls: AtomicUsize,
  }

  impl QuizSource for FakeSource {
    fn generate(&self, _setup: QuizSetup) -> GenerateFuture {
      let n = self.calls.fetch_add(1, Ordering::SeqCst);
      let delay = self.delay;
      let per_batch = self.per_batch;
      Box::pin(async move {
        let Some(d) = delay else {
          return std::future::pending::<Result<Vec<QuizQuestion>, AppError>>().await;
        };
        sleep(d).await;
        let questions: Vec<QuizQuestion> = (0..per_batch)
          .map(|i| QuizQuestion {
            question: format!("batch {n} q {i}"),
            options: vec!["a".into(), "b".into()],
            answer: "a".into(),
            explanation: None,
          })
          .collect();
        Ok::<_, AppError>(questions)
      })
    }
  }

  fn setup() -> QuizSetup {
    QuizSetup {
      file_name: "files/x".into(),
      difficulty: "easy".into(),
      num_questions: 1,
      question_type: "multiple_choice".into(),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn exhausted_session_resumes_when_refill_lands() {
    let source = Arc::new(FakeSource { delay: Some(Duration::from_secs(2)), per_batch: 1, calls: AtomicUsize::new(0) });
    let mut d = QuizDriver::new(source.clone(), 3, Duration::from_secs(30));

    d.handle(QuizEvent::StartRequested(setup()));
    let ev = d.next_internal().await;
    let out = d.handle(ev);
    assert!(matches!(out[0], Output::Question { index: 0, .. }));

    let out = d.handle(QuizEvent::AnswerSubmitted("a".into()));
    assert!(out.contains(&Output::Preparing));
    assert!(d.is_waiting_for_refill());
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    let ev = d.next_internal().await;
    let out = d.handle(ev);
    assert!(matches!(out[0], Output::Question { index: 1, .. }));
    assert!(!d.is_waiting_for_refill());
    assert_eq!(d.session().mode(), Mode::Active);
  }

  #[tokio::test(start_paused = true)]
  async fn refill_that_never_arrives_stalls_after_timeout() {
    let first = Arc::new(FakeSource { delay: Some(Duration::from_millis(10)), per_batch: 1, calls: AtomicUsize::new(0) });
    let mut d = QuizDriver::new(first, 3, Duration::from_secs(30));
    d.handle(QuizEvent::StartRequested(setup()));
    let ev = d.next_internal().await;
    d.handle(ev);

    // Swap in a source that hangs for the refill.
    d.source = Arc::new(FakeSource { delay: None, per_batch: 0, calls: AtomicUsize::new(0) });
    d.handle(QuizEvent::AnswerSubmitted("a".into()));

    let started = tokio::time::Instant::now();
    let ev = d.next_internal().await;
    assert!(matches!(ev, QuizEvent::RefillTimedOut));
    assert!(started.elapsed() >= Duration::from_secs(30));

    let out = d.handle(ev);
    assert_eq!(out, vec![Output::Stalled]);
    assert!(!d.is_waiting_for_refill());
    assert!(d.session().is_stalled());
  }
}
