pub mod ask;
pub mod chat;
pub mod doctor;
pub mod init;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use hrdesk_chat::{ChatEngine, PromptAssembler};
use hrdesk_config::AppConfig;
use hrdesk_core::{Diagnostics, KnowledgeCache};
use tracing::{error, info};

/// Everything a command needs to answer questions.
pub struct Runtime {
    pub config: AppConfig,
    pub engine: Arc<ChatEngine>,
    pub diagnostics: Diagnostics,
}

/// Load the config from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    };
    config.context("Failed to load config")
}

/// Startup: knowledge file, credential, provider. Any failure is fatal.
pub fn bootstrap(config: AppConfig) -> anyhow::Result<Runtime> {
    let mut diagnostics = Diagnostics::new();
    let path = &config.knowledge.path;

    let knowledge = match KnowledgeCache::global().get_or_load(path) {
        Ok(kb) => {
            info!(path = %path.display(), "Knowledge file loaded");
            diagnostics.success(format!("Dữ liệu nhân sự đã được tải từ: {}", path.display()));
            kb
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to load knowledge file");
            diagnostics.error(format!("❌ Lỗi khi tải dữ liệu: {e}"));
            return Err(e).context("Cannot start without the knowledge file");
        }
    };

    let api_key = match config.resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            error!(error = %e, "No API key available");
            diagnostics.error(format!("Lỗi: {e}"));
            return Err(e).context("Cannot start without an API key");
        }
    };

    let provider = match hrdesk_providers::build_from_config(&config, &api_key) {
        Ok(p) => p,
        Err(e) => {
            error!(model = %config.provider.model, error = %e, "Provider initialization failed");
            diagnostics.error(format!(
                "Lỗi khi khởi tạo model '{}': {e}",
                config.provider.model
            ));
            return Err(e).context("Provider initialization failed");
        }
    };

    diagnostics.info(format!("Sử dụng model: {}", config.provider.model));

    let engine = ChatEngine::new(provider, knowledge, PromptAssembler::from_config(&config));

    Ok(Runtime {
        config,
        engine: Arc::new(engine),
        diagnostics,
    })
}
