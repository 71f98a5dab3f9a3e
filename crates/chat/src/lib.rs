//! Chat orchestration for HRDesk.
//!
//! - [`prompt`]: builds generation requests from knowledge, history and a question
//! - [`consumer`]: folds a fragment stream into a running answer
//! - [`turn`]: the question-answer turn and its history effects
//! - [`session`]: isolated per-session histories
//! - [`stream_event`]: events forwarded to streaming clients

pub mod consumer;
pub mod prompt;
pub mod session;
pub mod stream_event;
pub mod turn;

pub use consumer::{StreamOutcome, consume};
pub use prompt::{DEFAULT_SYSTEM_INSTRUCTION, PromptAssembler, REFUSAL_SENTENCE};
pub use session::{DEFAULT_IDLE_TIMEOUT, PendingTurn, Session, SessionStore};
pub use stream_event::ChatStreamEvent;
pub use turn::{ChatEngine, TurnOutcome, TurnPhase};
