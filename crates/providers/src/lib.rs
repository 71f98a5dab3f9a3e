//! LLM Provider implementations for HRDesk.
//!
//! All providers implement the `hrdesk_core::Provider` trait and stream
//! their answers as `FragmentStream`s. The router builds the configured one.

pub mod gemini;
pub mod openai_compat;
pub mod router;
pub mod sse;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
