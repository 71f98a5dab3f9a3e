//! One question-answer turn.
//!
//! A turn moves `Idle → Submitted → Streaming` and ends in exactly one of
//! `Completed`, `StreamError` or `SubmitError`. Nothing is retried.
//!
//! History effects:
//! - `Completed` records the question and the answer.
//! - `StreamError` records the question and the partial answer followed by
//!   an inline error annotation.
//! - `SubmitError` records nothing; the question can simply be asked again.
//!   This covers both a refused request and a stream that fails before its
//!   first fragment (quota or auth errors reported in-band).
//! - A question repeating a trailing user entry, or a blank one, never
//!   leaves `Idle`.

use std::sync::Arc;

use hrdesk_core::error::ProviderError;
use hrdesk_core::knowledge::KnowledgeBase;
use hrdesk_core::message::{History, Message};
use hrdesk_core::provider::Provider;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::consumer::{StreamOutcome, consume};
use crate::prompt::PromptAssembler;

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Submitted,
    Streaming,
    Completed,
    StreamError,
    SubmitError,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::StreamError => "stream_error",
            Self::SubmitError => "submit_error",
        };
        f.write_str(s)
    }
}

/// The result of [`ChatEngine::ask`].
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The full answer was received and recorded.
    Completed { answer: String },
    /// The stream broke; `answer` is the annotated partial text that was recorded.
    StreamError { answer: String, error: ProviderError },
    /// The request failed, or its stream broke before any fragment arrived.
    SubmitError(ProviderError),
    /// Same text as the trailing user entry; ignored.
    Duplicate,
    /// Nothing to ask.
    Blank,
}

impl TurnOutcome {
    /// The terminal phase this outcome corresponds to.
    pub fn phase(&self) -> TurnPhase {
        match self {
            Self::Completed { .. } => TurnPhase::Completed,
            Self::StreamError { .. } => TurnPhase::StreamError,
            Self::SubmitError(_) => TurnPhase::SubmitError,
            Self::Duplicate | Self::Blank => TurnPhase::Idle,
        }
    }

    /// The answer as recorded in history, if one was.
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Completed { answer } | Self::StreamError { answer, .. } => Some(answer),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            Self::StreamError { error, .. } | Self::SubmitError(error) => Some(error),
            _ => None,
        }
    }
}

/// Text appended to a partial answer when its stream breaks.
pub fn stream_error_annotation(error: &ProviderError) -> String {
    format!("\n\n[Lỗi: Không thể hoàn thành câu trả lời - {error}]")
}

/// User-facing message for a request that never started streaming.
pub fn submit_error_message(error: &ProviderError) -> String {
    format!("🚨 Đã xảy ra lỗi khi gọi API: {error}")
}

/// Runs turns against one provider and one knowledge snapshot.
///
/// The engine holds no per-session state: callers pass the session's
/// [`History`] into every call.
pub struct ChatEngine {
    provider: Arc<dyn Provider>,
    knowledge: Arc<KnowledgeBase>,
    assembler: PromptAssembler,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        knowledge: Arc<KnowledgeBase>,
        assembler: PromptAssembler,
    ) -> Self {
        Self {
            provider,
            knowledge,
            assembler,
        }
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask `question` in the context of `history`.
    ///
    /// `on_update` receives the running answer after every fragment.
    pub async fn ask<F>(&self, history: &mut History, question: &str, on_update: F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        if question.trim().is_empty() {
            return TurnOutcome::Blank;
        }
        if history.is_resubmission(question) {
            debug!("Ignoring resubmitted question");
            return TurnOutcome::Duplicate;
        }

        let request = self
            .assembler
            .assemble(&self.knowledge, history.messages(), question);

        debug!(
            phase = %TurnPhase::Submitted,
            provider = self.provider.name(),
            model = %request.model,
            turns = request.turns.len(),
            "Submitting question"
        );

        let stream = match self.provider.stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(phase = %TurnPhase::SubmitError, error = %e, "Error calling generation API");
                return TurnOutcome::SubmitError(e);
            }
        };

        debug!(phase = %TurnPhase::Streaming, "Receiving answer");

        match consume(stream, on_update).await {
            StreamOutcome::Completed(answer) => {
                history.append_question(question);
                history.append(Message::assistant(answer.clone()));
                info!(
                    phase = %TurnPhase::Completed,
                    chars = answer.chars().count(),
                    history = history.len(),
                    "Turn completed"
                );
                TurnOutcome::Completed { answer }
            }
            StreamOutcome::Interrupted { partial, error } => {
                error!(phase = %TurnPhase::StreamError, error = %error, "Error during streaming response");
                let answer = format!("{partial}{}", stream_error_annotation(&error));
                history.append_question(question);
                history.append(Message::assistant(answer.clone()));
                TurnOutcome::StreamError { answer, error }
            }
            StreamOutcome::Rejected(error) => {
                error!(phase = %TurnPhase::SubmitError, error = %error, "Generation API rejected the request");
                TurnOutcome::SubmitError(error)
            }
        }
    }
}
