//! Chat-level streaming events.
//!
//! `ChatStreamEvent` describes a turn as it unfolds, in a shape the gateway
//! can forward to browsers over SSE.

use serde::{Deserialize, Serialize};

use crate::turn::{TurnOutcome, submit_error_message};

/// Events emitted while a turn runs.
///
/// - `session`: which session the turn belongs to
/// - `fragment`: a new piece of text plus the running answer
/// - `done`: the answer was recorded
/// - `error`: the turn failed before or during streaming
/// - `duplicate`: the question repeated the last one and was ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Session { session_id: String },

    Fragment { text: String, answer: String },

    Done { session_id: String, answer: String },

    /// `answer` is set when a partial answer was still recorded.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },

    Duplicate,
}

impl ChatStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Fragment { .. } => "fragment",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Duplicate => "duplicate",
        }
    }

    /// The closing event for a finished turn.
    pub fn from_outcome(session_id: &str, outcome: &TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::Completed { answer } => Self::Done {
                session_id: session_id.to_string(),
                answer: answer.clone(),
            },
            TurnOutcome::StreamError { answer, error } => Self::Error {
                message: format!("🚨 Lỗi trong quá trình nhận phản hồi: {error}"),
                answer: Some(answer.clone()),
            },
            TurnOutcome::SubmitError(error) => Self::Error {
                message: submit_error_message(error),
                answer: None,
            },
            TurnOutcome::Duplicate => Self::Duplicate,
            TurnOutcome::Blank => Self::Error {
                message: "Câu hỏi trống".into(),
                answer: None,
            },
        }
    }
}
