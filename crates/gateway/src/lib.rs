//! HTTP gateway for HRDesk.
//!
//! Serves the embedded chat page, a streaming chat endpoint, and session and
//! status endpoints. Built on Axum.

pub mod api;
pub mod frontend;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use hrdesk_chat::{ChatEngine, SessionStore};
use hrdesk_config::AppConfig;
use hrdesk_core::Diagnostics;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub engine: Arc<ChatEngine>,
    pub sessions: SessionStore,
    /// Startup notices shown in the side panel.
    pub diagnostics: Diagnostics,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(config: AppConfig, engine: Arc<ChatEngine>, diagnostics: Diagnostics) -> SharedState {
        let idle = Duration::from_secs(config.gateway.session_idle_minutes.saturating_mul(60));
        Arc::new(Self {
            config,
            engine,
            sessions: SessionStore::with_idle_timeout(idle),
            diagnostics,
        })
    }
}

/// Build the full router: page, API, and the shared layers.
///
/// Layers applied:
/// - CORS limited to `gateway.allowed_origins` (the page itself is same-origin)
/// - Request body size limit (64 KiB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);

    api::api_router(state)
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(_) if o == "*" => {
                warn!("Wildcard CORS origin is not supported; list origins explicitly");
                None
            }
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Drop idle sessions every half idle timeout.
pub fn spawn_session_sweeper(state: SharedState) -> tokio::task::JoinHandle<()> {
    let every = (state.sessions.idle_timeout() / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            state.sessions.sweep_expired().await;
        }
    })
}

/// Bind `gateway.host:gateway.port` and serve until Ctrl-C.
pub async fn start(state: SharedState) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let sweeper = spawn_session_sweeper(state.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    sweeper.abort();
    Ok(())
}
