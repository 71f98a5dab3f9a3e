//! Per-session history with an explicit lifecycle.
//!
//! Each session owns an isolated [`History`] behind its own async mutex, so
//! turns for one session run one at a time while different sessions proceed
//! independently. A session ends when it is destroyed or after it has been
//! idle for longer than the store's idle timeout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hrdesk_core::message::{History, Message};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

/// Idle time after which a session is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    history: Mutex<History>,
    /// Non-async, held briefly.
    last_active: std::sync::Mutex<Instant>,
    /// Questions submitted but not yet answered.
    in_flight: std::sync::Mutex<HashSet<String>>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            history: Mutex::new(History::new()),
            last_active: std::sync::Mutex::new(Instant::now()),
            in_flight: std::sync::Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Exclusive access to the history for the duration of a turn.
    pub async fn lock(&self) -> MutexGuard<'_, History> {
        let guard = self.history.lock().await;
        self.touch();
        guard
    }

    /// Copy of the last `n` messages.
    pub async fn recent(&self, n: usize) -> Vec<Message> {
        self.touch();
        self.history.lock().await.recent_window(n).to_vec()
    }

    /// Register `question` as submitted.
    ///
    /// Returns `None` while the same question is already waiting for its
    /// answer on this session, so a double submit runs only once. The
    /// returned guard releases the question when dropped.
    pub fn begin_turn(self: &Arc<Self>, question: &str) -> Option<PendingTurn> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(question.to_string()) {
            return None;
        }
        drop(in_flight);
        self.touch();
        Some(PendingTurn {
            session: Arc::clone(self),
            question: question.to_string(),
        })
    }

    /// How long the session has been unused, as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = *self.last_active.lock().unwrap_or_else(|e| e.into_inner());
        now.saturating_duration_since(last)
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }
}

/// A question accepted by [`Session::begin_turn`] and not yet answered.
#[derive(Debug)]
pub struct PendingTurn {
    session: Arc<Session>,
    question: String,
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        let mut in_flight = self
            .session
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.question);
        drop(in_flight);
        self.session.touch();
    }
}

/// All live sessions of the process. Nothing is persisted.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Start a new, empty session. Expired sessions are swept first.
    pub async fn create(&self) -> Arc<Session> {
        self.sweep_expired().await;

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone()));
        self.sessions.write().await.insert(id.clone(), session.clone());
        debug!(session_id = %id, "Session created");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Look up `id`, or create a fresh session when it is absent or unknown.
    pub async fn get_or_create(&self, id: Option<&str>) -> Arc<Session> {
        if let Some(id) = id {
            if let Some(session) = self.get(id).await {
                return session;
            }
        }
        self.create().await
    }

    /// Drop a session and its history. Returns whether it existed.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(session_id = %id, "Session destroyed");
        }
        removed
    }

    /// Drop every session idle for at least the idle timeout. Sessions still
    /// referenced elsewhere (a turn in progress) are kept. Returns how many
    /// were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            Arc::strong_count(session) > 1 || session.idle_for(now) < self.idle_timeout
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Expired idle sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_destroy() {
        let store = SessionStore::new();
        let session = store.create().await;
        assert_eq!(store.len().await, 1);
        assert!(store.get(session.id()).await.is_some());

        assert!(store.destroy(session.id()).await);
        assert!(!store.destroy(session.id()).await);
        assert!(store.get(session.id()).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.create().await;
        let b = store.create().await;
        assert_ne!(a.id(), b.id());

        a.lock().await.append(Message::user("only in a"));
        assert_eq!(a.recent(10).await.len(), 1);
        assert!(b.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn get_or_create_reuses_known_ids() {
        let store = SessionStore::new();
        let first = store.get_or_create(None).await;
        let again = store.get_or_create(Some(first.id())).await;
        assert_eq!(first.id(), again.id());

        let fresh = store.get_or_create(Some("unknown")).await;
        assert_ne!(fresh.id(), "unknown");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn recent_is_bounded() {
        let store = SessionStore::new();
        let session = store.create().await;
        {
            let mut history = session.lock().await;
            for i in 0..6 {
                history.append(Message::user(format!("m{i}")));
            }
        }
        let recent = session.recent(4).await;
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "m2");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let store = SessionStore::with_idle_timeout(Duration::from_secs(60));
        let stale = store.create().await;
        let stale_id = stale.id().to_string();
        drop(stale);

        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = store.create().await;

        assert!(store.get(&stale_id).await.is_none());
        assert!(store.get(fresh.id()).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_do_not_accumulate() {
        let store = SessionStore::with_idle_timeout(Duration::from_secs(60));
        for i in 0..50 {
            let id = format!("stale-{i}");
            store.get_or_create(Some(&id)).await;
            tokio::time::advance(Duration::from_secs(61)).await;
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_a_session_alive() {
        let store = SessionStore::with_idle_timeout(Duration::from_secs(60));
        let id = store.create().await.id().to_string();

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(&id).await.is_some());
        tokio::time::advance(Duration::from_secs(45)).await;

        assert_eq!(store.sweep_expired().await, 0);
        assert!(store.get(&id).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_in_use_are_not_swept() {
        let store = SessionStore::with_idle_timeout(Duration::from_secs(60));
        let busy = store.create().await;

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(store.sweep_expired().await, 0);

        drop(busy);
        assert_eq!(store.sweep_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn double_submit_is_rejected_while_pending() {
        let store = SessionStore::new();
        let session = store.create().await;

        let first = session.begin_turn("Q").expect("first submit accepted");
        assert!(session.begin_turn("Q").is_none());
        let other = session.begin_turn("another question");
        assert!(other.is_some());

        drop(first);
        assert!(session.begin_turn("Q").is_some());
    }
}
