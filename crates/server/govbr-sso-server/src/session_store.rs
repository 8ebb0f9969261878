//! Cookie-keyed in-memory session registry.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use govbr_oauth2::MemorySession;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "GOVBR_SESSION";

struct SessionEntry {
    session: MemorySession,
    last_seen: DateTime<Utc>,
}

/// Maps session ids to per-browser [`MemorySession`] slots with idle expiry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Look up a live session and refresh its idle timer.
    pub fn find(&self, id: &str) -> Option<MemorySession> {
        let now = Utc::now();
        let mut entry = self.sessions.get_mut(id)?;
        if now - entry.last_seen > self.ttl {
            drop(entry);
            self.sessions.remove(id);
            debug!("Session expired on access");
            return None;
        }
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    /// Return the session for `id` if it is live, otherwise open a new one.
    pub fn get_or_create(&self, id: Option<&str>) -> (String, MemorySession) {
        if let Some(id) = id {
            if let Some(session) = self.find(id) {
                return (id.to_string(), session);
            }
        }

        let id = Uuid::new_v4().to_string();
        let session = MemorySession::new();
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                session: session.clone(),
                last_seen: Utc::now(),
            },
        );
        debug!("Opened new session");
        (id, session)
    }

    /// Move a session to a fresh id, returning the new id.
    pub fn rotate(&self, id: &str) -> Option<String> {
        let (_, entry) = self.sessions.remove(id)?;
        let new_id = Uuid::new_v4().to_string();
        self.sessions.insert(
            new_id.clone(),
            SessionEntry {
                session: entry.session,
                last_seen: Utc::now(),
            },
        );
        Some(new_id)
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Drop every session idle for longer than the TTL. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now - entry.last_seen <= self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    fn backdate(&self, id: &str, by: Duration) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.last_seen = entry.last_seen - by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govbr_oauth2::SessionContext;
    use serde_json::json;

    #[test]
    fn test_get_or_create_reuses_live_session() {
        let store = SessionStore::new(60);
        let (id, _) = store.get_or_create(None);
        let (again, _) = store.get_or_create(Some(&id));
        assert_eq!(id, again);
        assert_eq!(store.len(), 1);

        let (other, _) = store.get_or_create(Some("unknown"));
        assert_ne!(other, "unknown");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_sessions_share_state_across_lookups() {
        let store = SessionStore::new(60);
        let (id, session) = store.get_or_create(None);
        session.store_user(json!({"sub": "1"})).await.unwrap();

        let found = store.find(&id).unwrap();
        assert_eq!(found.load_user().await.unwrap(), Some(json!({"sub": "1"})));
    }

    #[tokio::test]
    async fn test_rotate_keeps_contents() {
        let store = SessionStore::new(60);
        let (id, session) = store.get_or_create(None);
        session.store_user(json!({"sub": "1"})).await.unwrap();

        let new_id = store.rotate(&id).unwrap();
        assert_ne!(id, new_id);
        assert!(store.find(&id).is_none());
        let moved = store.find(&new_id).unwrap();
        assert!(moved.load_user().await.unwrap().is_some());

        assert!(store.rotate("missing").is_none());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::new(60);
        let (stale, _) = store.get_or_create(None);
        let (fresh, _) = store.get_or_create(None);
        store.backdate(&stale, Duration::seconds(120));

        assert_eq!(store.cleanup_expired(), 1);
        assert!(store.find(&stale).is_none());
        assert!(store.find(&fresh).is_some());
    }

    #[test]
    fn test_find_drops_expired_session() {
        let store = SessionStore::new(60);
        let (id, _) = store.get_or_create(None);
        store.backdate(&id, Duration::seconds(61));

        assert!(store.find(&id).is_none());
        assert!(store.is_empty());
    }
}
