//! Error types for the HRDesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all HRDesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Knowledge base errors ---
    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Why the knowledge document could not be loaded.
///
/// The three cases are kept apart so the operator sees whether the file is
/// missing, malformed, or unreadable for some other reason.
#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Knowledge file not found: '{path}'")]
    NotFound { path: PathBuf },

    #[error("Knowledge file '{path}' is not valid JSON: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to read knowledge file '{path}': {reason}")]
    Io { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited or quota exhausted by provider")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}
