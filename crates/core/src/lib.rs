//! # HRDesk Core
//!
//! Domain types, traits, and error definitions for the HRDesk knowledge-base
//! chat service. This crate has **no HTTP or UI dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The hosted generation API is a trait here ([`Provider`]); concrete clients
//! live in `hrdesk-providers`. Session history, the knowledge snapshot and
//! the stream of answer fragments are plain values with explicit lifecycles.

pub mod diagnostics;
pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use diagnostics::{Diagnostics, Notice, NoticeLevel};
pub use error::{Error, KnowledgeError, ProviderError, Result};
pub use knowledge::{KnowledgeBase, KnowledgeCache};
pub use message::{History, Message, Role};
pub use provider::{Fragment, FragmentStream, GenerationRequest, Provider, Turn, TurnRole};
