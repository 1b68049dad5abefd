//! Request-attached sessions and the internal session middleware.
//!
//! A [`Session`] is a shared handle: every clone observes the same
//! attributes, so a controller mutating the session it was handed sees the
//! change on any other argument resolved from the same request.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use axum::http::{HeaderValue, header::SET_COOKIE};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::request::{RequestContext, ResponseContext};

#[derive(Debug)]
struct SessionData {
    id: String,
    attributes: Map<String, Value>,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    is_new: bool,
}

/// Shared session handle.
#[derive(Clone)]
pub struct Session {
    inner: Arc<RwLock<SessionData>>,
}

impl Session {
    /// Create a brand new session with a random id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(RwLock::new(SessionData {
                id: id.into(),
                attributes: Map::new(),
                created_at: now,
                last_accessed_at: now,
                is_new: true,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> String {
        self.read().id.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().attributes.get(key).cloned()
    }

    /// Set an attribute, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.write().attributes.insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().attributes.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().attributes.contains_key(key)
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> Map<String, Value> {
        self.read().attributes.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.read().created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.read().last_accessed_at
    }

    /// `true` until the session has been persisted once.
    pub fn is_new(&self) -> bool {
        self.read().is_new
    }

    pub(crate) fn mark_persisted(&self) {
        self.write().is_new = false;
    }

    pub fn touch(&self) {
        self.write().last_accessed_at = Utc::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.last_accessed_at() > ttl
    }

    /// Whether both handles point at the same session.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("Session")
            .field("id", &data.id)
            .field("attributes", &data.attributes)
            .field("is_new", &data.is_new)
            .finish()
    }
}

/// Persistence backend for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn load(&self, id: &str) -> Option<Session>;

    async fn store(&self, session: &Session);

    async fn destroy(&self, id: &str);
}

/// In-process session store with idle expiry.
///
/// Expired sessions are dropped when loaded, and swept from the whole map
/// on `store` at most once per TTL.
pub struct MemorySessionStore {
    sessions: tokio::sync::RwLock<HashMap<String, Session>>,
    ttl: Duration,
    /// Unix millis of the last sweep.
    last_sweep: AtomicI64,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: tokio::sync::RwLock::new(HashMap::new()),
            ttl,
            last_sweep: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Remove every expired session, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        self.last_sweep
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.ttl));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "Purged expired sessions");
        }
        purged
    }

    fn sweep_due(&self) -> bool {
        let elapsed = Utc::now().timestamp_millis() - self.last_sweep.load(Ordering::Relaxed);
        elapsed >= self.ttl.num_milliseconds()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(30))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Option<Session> {
        let session = self.sessions.read().await.get(id).cloned()?;
        if session.is_expired(self.ttl) {
            debug!(session_id = id, "Session expired");
            self.sessions.write().await.remove(id);
            return None;
        }
        session.touch();
        Some(session)
    }

    async fn store(&self, session: &Session) {
        if self.sweep_due() {
            self.purge_expired().await;
        }
        session.mark_persisted();
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
    }

    async fn destroy(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }
}

/// Internal middleware wrapping every generated route handler.
#[derive(Clone)]
pub struct SessionMiddleware {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
}

impl SessionMiddleware {
    pub fn new(store: Arc<dyn SessionStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Pre-request hook: attach the caller's session, creating one (and its
    /// cookie) when the request carries no live session id.
    pub async fn create_session_cookie(
        &self,
        request: &mut RequestContext,
        response: &mut ResponseContext,
    ) {
        if let Some(id) = request.cookie(&self.cookie_name) {
            if let Some(session) = self.store.load(id).await {
                request.session = Some(session);
                return;
            }
        }

        let session = Session::new();
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            session.id()
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers.append(SET_COOKIE, value);
            }
            Err(e) => warn!("Could not build session cookie: {}", e),
        }
        debug!(session_id = %session.id(), "Created session");
        request.session = Some(session);
    }

    /// Post-request hook: persist whatever the request did to its session.
    pub async fn store_session(&self, request: &RequestContext) {
        if let Some(session) = &request.session {
            self.store.store(session).await;
        }
    }
}
