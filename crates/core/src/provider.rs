//! Provider trait: the abstraction over hosted generation APIs.
//!
//! A Provider takes a fully assembled [`GenerationRequest`] and returns a
//! [`FragmentStream`]: a lazy, finite, non-restartable sequence of text
//! fragments that ends either cleanly or with an error.
//!
//! Implementations: Google Gemini, OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// The only response format this service asks for.
pub const PLAIN_TEXT_MIME: &str = "text/plain";

/// Who a request turn is attributed to, in the API's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One role-tagged turn of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A fully assembled request, ready to hand to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "gemini-2.0-flash")
    pub model: String,

    /// Ordered turns; the last one always carries the new question
    pub turns: Vec<Turn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Requested response MIME type
    #[serde(default = "default_mime")]
    pub response_mime_type: String,
}

fn default_mime() -> String {
    PLAIN_TEXT_MIME.into()
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, turns: Vec<Turn>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            turns,
            temperature,
            response_mime_type: default_mime(),
        }
    }

    /// All turn text joined, handy for logging sizes and for assertions.
    pub fn full_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One incremental piece of a streamed response.
///
/// Some upstream chunks carry no text (finish markers, usage, safety
/// metadata); those contribute the empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub text: Option<String>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// A fragment with nothing to display.
    pub fn empty() -> Self {
        Self { text: None }
    }

    pub fn as_str(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// A streamed response: consumed once, front to back.
///
/// `next()` yields `Some(Ok(fragment))` while data flows, `Some(Err(_))` when
/// the stream breaks, and `None` once it has ended. After an error the stream
/// is finished; it cannot be restarted.
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<Fragment, ProviderError>>,
    finished: bool,
}

impl FragmentStream {
    /// Wrap the receiving half of a producer task's channel.
    pub fn new(rx: mpsc::Receiver<Result<Fragment, ProviderError>>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// Build a stream from an already known sequence (tests, canned replies).
    pub fn from_items(items: Vec<Result<Fragment, ProviderError>>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // Capacity covers every item, so this never fails.
            let _ = tx.try_send(item);
        }
        Self::new(rx)
    }

    pub async fn next(&mut self) -> Option<Result<Fragment, ProviderError>> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Ok(fragment)) => Some(Ok(fragment)),
            Some(Err(e)) => {
                self.finished = true;
                self.rx.close();
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// The core Provider trait.
///
/// `stream()` resolving to `Err` means the request never got going
/// (auth, quota, network, HTTP error): a submission failure. So is an error
/// delivered through the stream before its first fragment, which is how
/// some backends report quota or auth problems. Later errors are mid-stream
/// failures.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Submit the request and start streaming the answer.
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
