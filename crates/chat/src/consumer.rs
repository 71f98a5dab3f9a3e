//! Stream consumption: fold a [`FragmentStream`] into an answer.

use hrdesk_core::error::ProviderError;
use hrdesk_core::provider::FragmentStream;
use tracing::trace;

/// How a consumed stream ended.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// The stream reached its end; the full answer.
    Completed(String),
    /// The stream broke after `partial` had been received.
    Interrupted {
        partial: String,
        error: ProviderError,
    },
    /// The stream failed before its first fragment.
    Rejected(ProviderError),
}

impl StreamOutcome {
    /// Text received, whether or not the stream finished.
    pub fn text(&self) -> &str {
        match self {
            Self::Completed(text) => text,
            Self::Interrupted { partial, .. } => partial,
            Self::Rejected(_) => "",
        }
    }
}

/// Drain `stream`, calling `on_update` with the running buffer after every
/// fragment. Fragments without text contribute nothing but still trigger an
/// update. An error arriving before any fragment yields
/// [`StreamOutcome::Rejected`].
pub async fn consume<F>(mut stream: FragmentStream, mut on_update: F) -> StreamOutcome
where
    F: FnMut(&str),
{
    let mut buffer = String::new();
    let mut fragments = 0usize;

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                buffer.push_str(fragment.as_str());
                fragments += 1;
                on_update(&buffer);
            }
            Err(error) if fragments == 0 => {
                trace!("Stream failed before the first fragment");
                return StreamOutcome::Rejected(error);
            }
            Err(error) => {
                trace!(fragments, "Stream interrupted");
                return StreamOutcome::Interrupted {
                    partial: buffer,
                    error,
                };
            }
        }
    }

    trace!(fragments, chars = buffer.chars().count(), "Stream completed");
    StreamOutcome::Completed(buffer)
}
