//! Quiz session state machine.
//!
//! Pure and synchronous: `QuizSession::handle` takes an event and returns the
//! messages to show plus the effects the caller must run (start a batch
//! generation, arm/cancel the refill wait). The WebSocket driver owns the
//! timers and network calls; nothing in here sleeps or does I/O.
//!
//!   idle ──start──▶ awaiting-setup ──batch──▶ active ──last answer──▶ exhausted
//!    ▲                   │ fail                  ▲                        │
//!    └───────────────────┘                       └──────── batch ─────────┘
//!
//! `Reset` returns to idle from anywhere.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
  pub question: String,
  #[serde(default)]
  pub options: Vec<String>,
  pub answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

/// Batch generation parameters; reused for every refill of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSetup {
  pub file_name: String,
  pub difficulty: String,
  pub num_questions: u32,
  pub question_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  Idle,
  AwaitingSetup,
  Active,
  Exhausted,
}

#[derive(Clone, Debug)]
pub enum QuizEvent {
  StartRequested(QuizSetup),
  /// `epoch` identifies the session generation the batch was requested for;
  /// batches from before a reset are dropped.
  BatchLoaded { epoch: u64, questions: Vec<QuizQuestion> },
  BatchFailed { epoch: u64, reason: String },
  AnswerSubmitted(String),
  RefillTimedOut,
  Retry,
  Reset,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Output {
  Question { index: usize, question: String, options: Vec<String> },
  Feedback { correct: bool, answer: String, explanation: Option<String> },
  Preparing,
  Stalled,
  Failure(String),
  ResetDone,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
  Generate { epoch: u64, setup: QuizSetup },
  ArmRefillWait,
  CancelRefillWait,
}

#[derive(Debug, Default, PartialEq)]
pub struct Step {
  pub outputs: Vec<Output>,
  pub effects: Vec<Effect>,
}

impl Step {
  fn output(mut self, o: Output) -> Self {
    self.outputs.push(o);
    self
  }
  fn effect(mut self, e: Effect) -> Self {
    self.effects.push(e);
    self
  }
}

/// Loose on purpose: the trimmed canonical answer only has to appear inside
/// the submission, so "정답은 3번입니다" is accepted for answer "3".
/// Short numeric answers therefore also match unrelated digits.
pub fn is_correct(submission: &str, answer: &str) -> bool {
  let answer = answer.trim();
  submission.contains(answer) || submission == answer
}

/// Drop questions that cannot be presented or judged. True/false questions
/// come without options; they get the two fixed choices.
pub fn sanitize_batch(batch: Vec<QuizQuestion>) -> Vec<QuizQuestion> {
  batch
    .into_iter()
    .filter_map(|mut q| {
      if q.question.trim().is_empty() || q.answer.trim().is_empty() {
        return None;
      }
      if q.options.is_empty() {
        match q.answer.trim() {
          "참" | "거짓" => q.options = vec!["참".into(), "거짓".into()],
          _ => return None,
        }
      }
      Some(q)
    })
    .collect()
}

#[derive(Debug)]
pub struct QuizSession {
  questions: Vec<QuizQuestion>,
  current: usize,
  mode: Mode,
  setup: Option<QuizSetup>,
  /// Single in-flight flag for both the first batch and refills.
  generating: bool,
  /// Exhausted and the refill wait ran out; only `Retry` resumes.
  stalled: bool,
  epoch: u64,
  lookahead: usize,
}

impl QuizSession {
  pub fn new(lookahead: usize) -> Self {
    Self {
      questions: Vec::new(),
      current: 0,
      mode: Mode::Idle,
      setup: None,
      generating: false,
      stalled: false,
      epoch: 0,
      lookahead,
    }
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }
  #[cfg(test)]
  pub fn current_index(&self) -> usize {
    self.current
  }
  #[cfg(test)]
  pub fn questions(&self) -> &[QuizQuestion] {
    &self.questions
  }
  #[cfg(test)]
  pub fn is_generating(&self) -> bool {
    self.generating
  }
  #[cfg(test)]
  pub fn is_stalled(&self) -> bool {
    self.stalled
  }
  #[cfg(test)]
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn handle(&mut self, event: QuizEvent) -> Step {
    match event {
      QuizEvent::StartRequested(setup) => self.on_start(setup),
      QuizEvent::BatchLoaded { epoch, questions } => {
        if epoch != self.epoch {
          debug!(target: "quiz", epoch, current = self.epoch, "Dropping batch from a previous session");
          return Step::default();
        }
        self.on_batch(questions)
      }
      QuizEvent::BatchFailed { epoch, reason } => {
        if epoch != self.epoch {
          return Step::default();
        }
        self.on_failure(reason)
      }
      QuizEvent::AnswerSubmitted(text) => self.on_answer(&text),
      QuizEvent::RefillTimedOut => self.on_timeout(),
      QuizEvent::Retry => self.on_retry(),
      QuizEvent::Reset => self.reset().output(Output::ResetDone),
    }
  }

  fn reset(&mut self) -> Step {
    self.questions.clear();
    self.current = 0;
    self.mode = Mode::Idle;
    self.setup = None;
    self.generating = false;
    self.stalled = false;
    self.epoch += 1;
    Step::default().effect(Effect::CancelRefillWait)
  }

  fn generate(&mut self) -> Option<Effect> {
    if self.generating {
      return None;
    }
    let setup = self.setup.clone()?;
    self.generating = true;
    Some(Effect::Generate { epoch: self.epoch, setup })
  }

  fn on_start(&mut self, setup: QuizSetup) -> Step {
    if self.generating && self.mode == Mode::AwaitingSetup {
      debug!(target: "quiz", "Start ignored: generation already in flight");
      return Step::default();
    }
    let mut step = if self.mode == Mode::Idle { Step::default() } else { self.reset() };
    info!(target: "quiz", file = %setup.file_name, difficulty = %setup.difficulty, n = setup.num_questions, "Quiz requested");
    self.setup = Some(setup);
    self.mode = Mode::AwaitingSetup;
    if let Some(e) = self.generate() {
      step = step.effect(e);
    }
    step
  }

  fn on_batch(&mut self, batch: Vec<QuizQuestion>) -> Step {
    self.generating = false;
    let batch = sanitize_batch(batch);
    if batch.is_empty() {
      return self.on_failure("생성된 문제가 없습니다.".into());
    }
    info!(target: "quiz", added = batch.len(), loaded = self.questions.len(), mode = ?self.mode, "Batch loaded");
    self.questions.extend(batch);

    match self.mode {
      Mode::AwaitingSetup => {
        self.current = 0;
        self.mode = Mode::Active;
        Step::default().output(self.present())
      }
      Mode::Exhausted if !self.stalled => {
        self.mode = Mode::Active;
        Step::default()
          .effect(Effect::CancelRefillWait)
          .output(self.present())
      }
      // Active (prefetch landed early) or stalled: keep for later.
      _ => Step::default(),
    }
  }

  fn on_failure(&mut self, reason: String) -> Step {
    self.generating = false;
    warn!(target: "quiz", %reason, mode = ?self.mode, "Quiz generation failed");
    match self.mode {
      Mode::AwaitingSetup => {
        self.questions.clear();
        self.current = 0;
        self.setup = None;
        self.mode = Mode::Idle;
        Step::default().output(Output::Failure(format!("퀴즈 생성에 실패했습니다: {reason}")))
      }
      Mode::Exhausted if !self.stalled => {
        self.stalled = true;
        Step::default()
          .effect(Effect::CancelRefillWait)
          .output(Output::Failure(format!("다음 문제를 생성하지 못했습니다: {reason}")))
          .output(Output::Stalled)
      }
      // A failed prefetch is retried by the next answer.
      _ => Step::default(),
    }
  }

  fn on_answer(&mut self, text: &str) -> Step {
    match self.mode {
      Mode::Active => {}
      Mode::Exhausted if self.stalled => return Step::default().output(Output::Stalled),
      Mode::Exhausted => return Step::default().output(Output::Preparing),
      Mode::Idle | Mode::AwaitingSetup => {
        return Step::default().output(Output::Failure("진행 중인 퀴즈가 없습니다.".into()))
      }
    }

    let answered = self.current;
    let q = &self.questions[answered];
    let correct = is_correct(text.trim(), &q.answer);
    debug!(target: "quiz", index = answered, correct, "Answer judged");
    let mut step = Step::default().output(Output::Feedback {
      correct,
      answer: q.answer.clone(),
      explanation: q.explanation.clone().filter(|e| !e.trim().is_empty()),
    });
    self.current += 1;

    if answered + self.lookahead >= self.questions.len() {
      if let Some(e) = self.generate() {
        info!(target: "quiz", answered, loaded = self.questions.len(), "Prefetching next batch");
        step = step.effect(e);
      }
    }

    if self.current < self.questions.len() {
      return step.output(self.present());
    }

    self.mode = Mode::Exhausted;
    if let Some(e) = self.generate() {
      step = step.effect(e);
    }
    step.output(Output::Preparing).effect(Effect::ArmRefillWait)
  }

  fn on_timeout(&mut self) -> Step {
    if self.mode != Mode::Exhausted || self.stalled {
      return Step::default();
    }
    warn!(target: "quiz", loaded = self.questions.len(), "Refill did not arrive in time");
    self.stalled = true;
    Step::default().output(Output::Stalled)
  }

  fn on_retry(&mut self) -> Step {
    match self.mode {
      Mode::Exhausted => {
        self.stalled = false;
        if self.current < self.questions.len() {
          self.mode = Mode::Active;
          return Step::default().output(self.present());
        }
        let mut step = Step::default();
        if let Some(e) = self.generate() {
          step = step.effect(e);
        }
        step.output(Output::Preparing).effect(Effect::ArmRefillWait)
      }
      Mode::Active => Step::default().output(self.present()),
      Mode::AwaitingSetup => Step::default().output(Output::Preparing),
      Mode::Idle => Step::default().output(Output::Failure("먼저 퀴즈를 시작해주세요.".into())),
    }
  }

  fn present(&self) -> Output {
    let q = &self.questions[self.current];
    Output::Question {
      index: self.current,
      question: q.question.clone(),
      options: q.options.clone(),
    }
  }
}
