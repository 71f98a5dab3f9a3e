//! Provider factory: builds the configured generation backend.

use std::sync::Arc;

use hrdesk_config::{ApiKey, AppConfig};
use hrdesk_core::error::ProviderError;
use hrdesk_core::provider::Provider;
use tracing::info;

use crate::gemini::GeminiProvider;
use crate::openai_compat::{OPENAI_API_BASE, OpenAiCompatProvider};

/// Build the provider named by `config.provider.kind`.
pub fn build_from_config(
    config: &AppConfig,
    api_key: &ApiKey,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let settings = &config.provider;

    let provider: Arc<dyn Provider> = match settings.kind.as_str() {
        "gemini" => {
            let mut p = GeminiProvider::new(api_key.expose());
            if let Some(url) = &settings.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "openai" => {
            let base_url = settings.api_url.as_deref().unwrap_or(OPENAI_API_BASE);
            Arc::new(OpenAiCompatProvider::new("openai", base_url, api_key.expose()))
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider kind '{other}'"
            )));
        }
    };

    info!(
        provider = provider.name(),
        model = %settings.model,
        key_source = %api_key.source(),
        "Provider initialized"
    );
    Ok(provider)
}
