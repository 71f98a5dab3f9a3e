//! JSON and SSE endpoints.
//!
//! ## Endpoints
//!
//! | Method | Path                              | Description                      |
//! |--------|-----------------------------------|----------------------------------|
//! | GET    | /health                           | Liveness                         |
//! | GET    | /v1/status                        | Model, limits, startup notices   |
//! | POST   | /v1/sessions                      | Start a session                  |
//! | GET    | /v1/sessions/{id}/messages        | Recent messages of a session     |
//! | DELETE | /v1/sessions/{id}                 | Drop a session                   |
//! | POST   | /v1/chat/stream                   | Ask a question, answer over SSE  |

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use futures::StreamExt;
use hrdesk_chat::{ChatStreamEvent, TurnOutcome};
use hrdesk_config::PromptMode;
use hrdesk_core::{Message, Notice};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::SharedState;

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/status", get(status_handler))
        .route("/v1/sessions", post(create_session_handler))
        .route("/v1/sessions/{id}", axum::routing::delete(delete_session_handler))
        .route("/v1/sessions/{id}/messages", get(messages_handler))
        .route("/v1/chat/stream", post(chat_stream_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Health & status ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub provider: String,
    pub model: String,
    pub prompt_mode: PromptMode,
    pub temperature: f32,
    pub display_history_limit: usize,
    pub model_history_limit: usize,
    pub knowledge_path: String,
    pub sessions: usize,
    pub diagnostics: Vec<Notice>,
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let assembler = state.engine.assembler();
    Json(StatusResponse {
        provider: state.engine.provider_name().to_string(),
        model: assembler.model().to_string(),
        prompt_mode: assembler.mode(),
        temperature: assembler.temperature(),
        display_history_limit: state.config.chat.display_history_limit,
        model_history_limit: assembler.history_limit(),
        knowledge_path: state.engine.knowledge().path().display().to_string(),
        sessions: state.sessions.len().await,
        diagnostics: state.diagnostics.notices().to_vec(),
    })
}

// ── Sessions ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

async fn create_session_handler(
    State(state): State<SharedState>,
) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id().to_string(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

async fn messages_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown session '{id}'")))?;

    let limit = query
        .limit
        .unwrap_or(state.config.chat.display_history_limit);

    Ok(Json(MessagesResponse {
        session_id: id,
        messages: session.recent(limit).await,
    }))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.destroy(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown session '{id}'"),
        ))
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub question: String,
}

/// `POST /v1/chat/stream`: ask a question and receive the answer as SSE.
///
/// Event order: one `session`, any number of `fragment`s, then exactly one of
/// `done`, `error` or `duplicate`. A turn for a session waits for any turn
/// already running on that session; resubmitting a question that is still
/// pending on the session yields `duplicate` without a second request.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if payload.question.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Question must not be empty"));
    }

    let session = state
        .sessions
        .get_or_create(payload.session_id.as_deref())
        .await;
    info!(session_id = %session.id(), "v1/chat/stream request");

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let _ = tx.send(ChatStreamEvent::Session {
        session_id: session.id().to_string(),
    });

    let Some(pending) = session.begin_turn(&payload.question) else {
        debug!(session_id = %session.id(), "Question already pending; ignoring resubmission");
        let _ = tx.send(ChatStreamEvent::from_outcome(session.id(), &TurnOutcome::Duplicate));
        return Ok(sse_response(rx));
    };

    let engine = state.engine.clone();
    let question = payload.question;
    tokio::spawn(async move {
        let _pending = pending;
        let mut history = session.lock().await;
        let mut sent = 0usize;

        let outcome = engine
            .ask(&mut history, &question, |answer| {
                let text = answer[sent..].to_string();
                sent = answer.len();
                // A closed channel means the client went away; the turn still finishes.
                let _ = tx.send(ChatStreamEvent::Fragment {
                    text,
                    answer: answer.to_string(),
                });
            })
            .await;

        debug!(session_id = %session.id(), phase = %outcome.phase(), "Turn finished");
        let _ = tx.send(ChatStreamEvent::from_outcome(session.id(), &outcome));
    });

    Ok(sse_response(rx))
}

fn sse_response(
    rx: tokio::sync::mpsc::UnboundedReceiver<ChatStreamEvent>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    Sse::new(UnboundedReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayState, build_router};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use hrdesk_chat::{ChatEngine, PromptAssembler};
    use hrdesk_config::AppConfig;
    use hrdesk_core::error::ProviderError;
    use hrdesk_core::provider::{Fragment, FragmentStream, GenerationRequest, Provider};
    use hrdesk_core::{Diagnostics, KnowledgeBase};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct CannedProvider {
        reply: Result<Vec<&'static str>, ProviderError>,
    }

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn stream(&self, _request: GenerationRequest) -> Result<FragmentStream, ProviderError> {
            let parts = self.reply.clone()?;
            Ok(FragmentStream::from_items(
                parts.into_iter().map(|p| Ok(Fragment::text(p))).collect(),
            ))
        }
    }

    fn test_state(reply: Result<Vec<&'static str>, ProviderError>) -> SharedState {
        let config = AppConfig::default();
        let knowledge = KnowledgeBase::from_value(
            "data.json",
            serde_json::json!({"employees": [{"name": "Nguyen Van A", "email": "a@inno.com"}]}),
        );
        let engine = ChatEngine::new(
            Arc::new(CannedProvider { reply }),
            Arc::new(knowledge),
            PromptAssembler::from_config(&config),
        );
        let mut diagnostics = Diagnostics::new();
        diagnostics.success("Dữ liệu nhân sự đã được tải từ: data.json");
        GatewayState::new(config, Arc::new(engine), diagnostics)
    }

    fn ok_state() -> SharedState {
        test_state(Ok(vec!["Email ", "là a@inno.com"]))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/chat/stream")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// `(event, data)` pairs of an SSE body.
    fn sse_events(body: &str) -> Vec<(String, serde_json::Value)> {
        body.split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                let mut event = String::new();
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        event = v.trim().to_string();
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data.push_str(v.trim_start());
                    }
                }
                (event, serde_json::from_str(&data).unwrap())
            })
            .collect()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(ok_state());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"ok\""));
    }

    #[tokio::test]
    async fn status_reports_model_and_notices() {
        let app = build_router(ok_state());
        let req = Request::builder().uri("/v1/status").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let status: StatusResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(status.model, "gemini-2.0-flash");
        assert_eq!(status.prompt_mode, PromptMode::StructuredTurns);
        assert_eq!(status.display_history_limit, 4);
        assert_eq!(status.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn chat_stream_answers_and_records() {
        let state = ok_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(chat_request(serde_json::json!({"question": "email của Nguyen Van A?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let events = sse_events(&body_string(response).await);
        let names: Vec<&str> = events.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(names, vec!["session", "fragment", "fragment", "done"]);
        assert_eq!(events[1].1["text"], "Email ");
        assert_eq!(events[2].1["answer"], "Email là a@inno.com");
        assert_eq!(events[3].1["answer"], "Email là a@inno.com");

        let session_id = events[0].1["session_id"].as_str().unwrap().to_string();
        let session = state.sessions.get(&session_id).await.unwrap();
        let messages = session.recent(10).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Email là a@inno.com");
    }

    #[tokio::test]
    async fn submit_error_is_an_error_event() {
        let state = test_state(Err(ProviderError::AuthenticationFailed("bad key".into())));
        let app = build_router(state.clone());

        let response = app
            .oneshot(chat_request(serde_json::json!({"question": "Q"})))
            .await
            .unwrap();
        let events = sse_events(&body_string(response).await);

        assert_eq!(events.last().unwrap().0, "error");
        assert!(events.last().unwrap().1["message"].as_str().unwrap().contains("bad key"));

        let session_id = events[0].1["session_id"].as_str().unwrap();
        let session = state.sessions.get(session_id).await.unwrap();
        assert!(session.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn empty_question_rejected() {
        let app = build_router(ok_state());
        let response = app
            .oneshot(chat_request(serde_json::json!({"question": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let app = build_router(ok_state());
        let big = "x".repeat(crate::MAX_BODY_BYTES + 1);
        let response = app
            .oneshot(chat_request(serde_json::json!({"question": big})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let state = ok_state();

        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/sessions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: SessionCreated = serde_json::from_str(&body_string(response).await).unwrap();

        {
            let session = state.sessions.get(&created.session_id).await.unwrap();
            let mut history = session.lock().await;
            for i in 0..6 {
                history.append(Message::user(format!("m{i}")));
            }
        }

        let uri = format!("/v1/sessions/{}/messages", created.session_id);
        let response = build_router(state.clone())
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let page: MessagesResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(page.messages.len(), 4);
        assert_eq!(page.messages[0].content, "m2");

        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("{uri}?limit=2"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let page: MessagesResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(page.messages.len(), 2);

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/sessions/{}", created.session_id))
                .body(Body::empty())
                .unwrap()
        };
        let response = build_router(state.clone()).oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = build_router(state.clone()).oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_session_messages_is_404() {
        let app = build_router(ok_state());
        let req = Request::builder()
            .uri("/v1/sessions/nope/messages")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// Answers only after the test opens the gate.
    struct GatedProvider {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl Provider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        async fn stream(&self, _request: GenerationRequest) -> Result<FragmentStream, ProviderError> {
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            let gate = self.gate.clone();
            tokio::spawn(async move {
                gate.notified().await;
                let _ = tx.send(Ok(Fragment::text("a@inno.com"))).await;
            });
            Ok(FragmentStream::new(rx))
        }
    }

    #[tokio::test]
    async fn double_submit_while_pending_is_duplicate() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let config = AppConfig::default();
        let knowledge = KnowledgeBase::from_value("data.json", serde_json::json!({}));
        let engine = ChatEngine::new(
            Arc::new(GatedProvider { gate: gate.clone() }),
            Arc::new(knowledge),
            PromptAssembler::from_config(&config),
        );
        let state = GatewayState::new(config, Arc::new(engine), Diagnostics::new());
        let session_id = state.sessions.create().await.id().to_string();
        let ask = || chat_request(serde_json::json!({"session_id": session_id, "question": "email?"}));

        let first = build_router(state.clone()).oneshot(ask()).await.unwrap();
        let second = build_router(state.clone()).oneshot(ask()).await.unwrap();

        let events = sse_events(&body_string(second).await);
        let names: Vec<&str> = events.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(names, vec!["session", "duplicate"]);

        gate.notify_one();
        let events = sse_events(&body_string(first).await);
        assert_eq!(events.last().unwrap().0, "done");

        let session = state.sessions.get(&session_id).await.unwrap();
        assert_eq!(session.recent(10).await.len(), 2);

        // Answered, so the same question may be asked again.
        let third = build_router(state.clone()).oneshot(ask()).await.unwrap();
        gate.notify_one();
        let events = sse_events(&body_string(third).await);
        assert_eq!(events.last().unwrap().0, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_session_ids_are_reclaimed() {
        let state = ok_state();
        let idle = state.sessions.idle_timeout();

        for i in 0..50 {
            let request = chat_request(serde_json::json!({"session_id": format!("stale-{i}"), "question": "Q"}));
            let response = build_router(state.clone()).oneshot(request).await.unwrap();
            body_string(response).await;
            tokio::time::advance(idle + std::time::Duration::from_secs(1)).await;
        }

        assert_eq!(state.sessions.len().await, 1);
    }
}
