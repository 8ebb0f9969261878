//! Per-user session capability used by the login flow.
//!
//! The host owns the session mechanism; this crate only needs the typed slots below.

use crate::error::OAuth2Result;
use crate::pkce::PkceChallenge;
use crate::token::generate_security_token;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Anti-forgery material for one in-flight login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

impl SecurityContext {
    /// Fresh state and nonce bound to an existing PKCE verifier.
    pub fn new(pkce: &PkceChallenge) -> Self {
        Self {
            state: generate_security_token(),
            nonce: generate_security_token(),
            code_verifier: pkce.code_verifier.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl_seconds: u64) -> bool {
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        match self.created_at.checked_add_signed(ttl) {
            Some(deadline) => Utc::now() > deadline,
            None => false,
        }
    }
}

/// Session slots read and written by the login flow.
///
/// Implementations are scoped to a single user session. The host must not run two
/// requests of the same session through the flow concurrently.
#[async_trait]
pub trait SessionContext: Send + Sync {
    /// Replace any pending login attempt.
    async fn store_security_context(&self, context: SecurityContext) -> OAuth2Result<()>;

    /// Remove and return the pending login attempt.
    async fn take_security_context(&self) -> OAuth2Result<Option<SecurityContext>>;

    /// Write the authenticated identity.
    async fn store_user(&self, user: Value) -> OAuth2Result<()>;

    /// Raw stored identity, in whatever shape the backend keeps it.
    async fn load_user(&self) -> OAuth2Result<Option<Value>>;

    /// Destroy every slot. Invalidating an empty session is a no-op.
    async fn invalidate(&self) -> OAuth2Result<()>;
}

#[derive(Debug, Default)]
struct SessionData {
    security: Option<SecurityContext>,
    user: Option<Value>,
}

/// In-process session. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    data: Arc<RwLock<SessionData>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending login attempt without consuming it.
    pub async fn peek_security_context(&self) -> Option<SecurityContext> {
        self.data.read().await.security.clone()
    }

    pub async fn is_empty(&self) -> bool {
        let data = self.data.read().await;
        data.security.is_none() && data.user.is_none()
    }
}

#[async_trait]
impl SessionContext for MemorySession {
    async fn store_security_context(&self, context: SecurityContext) -> OAuth2Result<()> {
        self.data.write().await.security = Some(context);
        Ok(())
    }

    async fn take_security_context(&self) -> OAuth2Result<Option<SecurityContext>> {
        Ok(self.data.write().await.security.take())
    }

    async fn store_user(&self, user: Value) -> OAuth2Result<()> {
        self.data.write().await.user = Some(user);
        Ok(())
    }

    async fn load_user(&self) -> OAuth2Result<Option<Value>> {
        Ok(self.data.read().await.user.clone())
    }

    async fn invalidate(&self) -> OAuth2Result<()> {
        let mut data = self.data.write().await;
        data.security = None;
        data.user = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_security_context_is_single_use() {
        let session = MemorySession::new();
        let context = SecurityContext::new(&PkceChallenge::new());

        session.store_security_context(context.clone()).await.unwrap();
        assert_eq!(session.peek_security_context().await, Some(context.clone()));

        let taken = session.take_security_context().await.unwrap();
        assert_eq!(taken, Some(context));

        // Try to take again - should be gone
        assert_eq!(session.take_security_context().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_new_login_overwrites_pending_attempt() {
        let session = MemorySession::new();
        let first = SecurityContext::new(&PkceChallenge::new());
        let second = SecurityContext::new(&PkceChallenge::new());

        session.store_security_context(first).await.unwrap();
        session.store_security_context(second.clone()).await.unwrap();

        assert_eq!(session.take_security_context().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_invalidate_clears_everything() {
        let session = MemorySession::new();
        session
            .store_security_context(SecurityContext::new(&PkceChallenge::new()))
            .await
            .unwrap();
        session
            .store_user(serde_json::json!({"sub": "1"}))
            .await
            .unwrap();

        session.invalidate().await.unwrap();
        assert!(session.is_empty().await);

        // Second invalidation is a no-op
        session.invalidate().await.unwrap();
        assert!(session.load_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_slots() {
        let session = MemorySession::new();
        let handle = session.clone();
        handle
            .store_user(serde_json::json!({"sub": "1"}))
            .await
            .unwrap();
        assert!(session.load_user().await.unwrap().is_some());
    }

    #[test]
    fn test_expiry() {
        let mut context = SecurityContext::new(&PkceChallenge::new());
        assert!(!context.is_expired(600));

        context.created_at = Utc::now() - Duration::minutes(11);
        assert!(context.is_expired(600));
    }

    #[test]
    fn test_state_and_nonce_independent() {
        let context = SecurityContext::new(&PkceChallenge::new());
        assert_ne!(context.state, context.nonce);
        assert!(context.code_verifier.len() >= 43);
    }
}
