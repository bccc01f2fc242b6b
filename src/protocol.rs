//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::openai::ChatMessage;
use crate::quiz::{Output, QuizSetup};
use crate::schedule::ScheduleView;
use crate::taxonomy::{Field, QualificationItem};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartQuiz {
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(default = "default_difficulty")]
        difficulty: String,
        #[serde(rename = "numQuestions", default)]
        num_questions: Option<u32>,
        #[serde(rename = "questionType", default)]
        question_type: Option<String>,
    },
    SubmitAnswer {
        answer: String,
    },
    Retry,
    NewSession,
}

fn default_difficulty() -> String {
    "medium".into()
}

pub const DEFAULT_QUESTION_TYPE: &str = "multiple_choice";

impl ClientWsMessage {
    /// Setup for a `start_quiz` frame; `default_batch` fills a missing or zero count.
    pub fn into_setup(self, default_batch: u32) -> Option<QuizSetup> {
        match self {
            ClientWsMessage::StartQuiz { file_name, difficulty, num_questions, question_type } => Some(QuizSetup {
                file_name,
                difficulty,
                num_questions: num_questions.filter(|n| *n > 0).unwrap_or(default_batch),
                question_type: question_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.into()),
            }),
            _ => None,
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Question {
        index: usize,
        question: String,
        options: Vec<String>,
    },
    Feedback {
        correct: bool,
        answer: String,
        explanation: Option<String>,
    },
    Preparing {
        message: String,
    },
    Stalled {
        message: String,
    },
    Failure {
        message: String,
    },
    Reset,
    Error {
        message: String,
    },
}

impl From<Output> for ServerWsMessage {
    fn from(o: Output) -> Self {
        match o {
            Output::Question { index, question, options } => ServerWsMessage::Question { index, question, options },
            Output::Feedback { correct, answer, explanation } => ServerWsMessage::Feedback { correct, answer, explanation },
            Output::Preparing => ServerWsMessage::Preparing { message: "다음 문제를 준비하고 있습니다...".into() },
            Output::Stalled => ServerWsMessage::Stalled {
                message: "문제 생성이 지연되고 있습니다. 다시 시도해주세요.".into(),
            },
            Output::Failure(message) => ServerWsMessage::Failure { message },
            Output::ResetDone => ServerWsMessage::Reset,
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct QnetListQuery {
    #[serde(rename = "implYy")]
    pub impl_yy: Option<String>,
    #[serde(rename = "implSeq")]
    pub impl_seq: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JmQuery {
    #[serde(rename = "jmCd")]
    pub jm_cd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QualificationQuery {
    pub gno: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaxonomyQuery {
    pub broad: Option<String>,
    pub mid: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyOut {
    pub broad_fields: Vec<Field>,
    pub mid_fields: Vec<Field>,
    pub subjects: Vec<QualificationItem>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    #[serde(rename = "jmCd")]
    pub jm_cd: Option<String>,
    pub year: Option<String>,
}

/// Display view plus the raw record (sent back for study plans).
#[derive(Debug, Serialize)]
pub struct ScheduleOut {
    #[serde(flatten)]
    pub view: ScheduleView,
    pub record: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}
#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StudyPlanOut {
    pub success: bool,
    pub subject: String,
    pub study_plan: String,
    pub exam_schedule: Map<String, Value>,
    pub start_date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesOut {
    pub test_info: String,
    pub qualification: String,
    /// "enabled" or "disabled".
    pub openai: &'static str,
    pub rag_backend: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub services: ServicesOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_quiz_defaults_fill_in() {
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"start_quiz","fileName":"a.pdf"}"#).unwrap();
        let setup = msg.into_setup(5).unwrap();
        assert_eq!(setup.file_name, "a.pdf");
        assert_eq!(setup.difficulty, "medium");
        assert_eq!(setup.num_questions, 5);
        assert_eq!(setup.question_type, DEFAULT_QUESTION_TYPE);
    }

    #[test]
    fn unit_frames_parse() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"new_session"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::NewSession));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"submit_answer","answer":"3"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SubmitAnswer { ref answer } if answer == "3"));
    }

    #[test]
    fn outputs_serialize_with_type_tags() {
        let v = serde_json::to_value(ServerWsMessage::from(Output::Question {
            index: 2,
            question: "Q".into(),
            options: vec!["a".into()],
        }))
        .unwrap();
        assert_eq!(v["type"], "question");
        assert_eq!(v["index"], 2);

        let v = serde_json::to_value(ServerWsMessage::from(Output::ResetDone)).unwrap();
        assert_eq!(v, serde_json::json!({"type": "reset"}));
        let v = serde_json::to_value(ServerWsMessage::from(Output::Stalled)).unwrap();
        assert_eq!(v["type"], "stalled");
    }
}
