//! HTTP host for the Gov.br login flow.
//!
//! Wires [`govbr_oauth2::GovBrAuthService`] to axum routes, keeping one
//! [`govbr_oauth2::MemorySession`] per browser behind an HTTP-only cookie.

pub mod config;
pub mod error;
pub mod routes;
pub mod session_store;

pub use config::Config;
pub use error::AppError;
pub use routes::{AppState, create_router};
pub use session_store::{SESSION_COOKIE, SessionStore};

use anyhow::Context;
use govbr_oauth2::GovBrAuthService;
use std::sync::Arc;

/// Build the application state from loaded configuration.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let auth = GovBrAuthService::new(config.provider.clone())
        .context("Failed to initialize the Gov.br client")?;
    let sessions = SessionStore::new(config.session.ttl_seconds);

    Ok(AppState::new(Arc::new(auth), sessions).with_secure_cookie(config.session.secure_cookie))
}
