//! HTTP routes for the login flow.

use crate::error::AppError;
use crate::session_store::{SESSION_COOKIE, SessionStore};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use govbr_oauth2::{AuthService, CallbackOutcome, CallbackParams, MemorySession};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthService>,
    pub sessions: SessionStore,
    pub secure_cookie: bool,
}

impl AppState {
    pub fn new(auth: Arc<dyn AuthService>, sessions: SessionStore) -> Self {
        Self {
            auth,
            sessions,
            secure_cookie: false,
        }
    }

    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    fn session_cookie(&self, id: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, id))
            .path("/")
            .http_only(true)
            // Lax so the cookie survives the top-level redirect back from the provider
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .build()
    }

    /// The live session named by the request cookie, if any.
    fn current_session(&self, jar: &CookieJar) -> Option<(String, MemorySession)> {
        let id = jar.get(SESSION_COOKIE)?.value().to_string();
        let session = self.sessions.find(&id)?;
        Some((id, session))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/openid", get(callback))
        .route("/user", get(user))
        .route("/logout", get(logout))
        .route("/logout/govbr", get(logout_landing))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Redirect {
    Redirect::to("/user")
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let existing = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (id, session) = state.sessions.get_or_create(existing.as_deref());

    let url = state.auth.build_login_url(&session).await?;

    Ok((jar.add(state.session_cookie(id)), Redirect::to(&url)))
}

async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let current = state.current_session(&jar);
    if current.is_none() {
        debug!("Callback arrived without a live session");
    }
    let session = current
        .as_ref()
        .map(|(_, session)| session.clone())
        .unwrap_or_default();

    match state.auth.handle_callback(params, &session).await? {
        CallbackOutcome::ProviderError(payload) => {
            Ok((StatusCode::BAD_REQUEST, Json(payload)).into_response())
        }
        CallbackOutcome::Redirect(target) => {
            // New id once the session carries an identity
            let rotated = current.and_then(|(id, _)| state.sessions.rotate(&id));
            let jar = match rotated {
                Some(new_id) => jar.add(state.session_cookie(new_id)),
                None => jar,
            };
            Ok((jar, Redirect::to(&target)).into_response())
        }
    }
}

async fn user(State(state): State<AppState>, jar: CookieJar) -> Response {
    let session = state
        .current_session(&jar)
        .map(|(_, session)| session)
        .unwrap_or_default();

    match state.auth.get_user(&session).await {
        Some(user) => Json(user).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Usuário não logado",
                "code": 401,
            })),
        )
            .into_response(),
    }
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let (id, session) = match state.current_session(&jar) {
        Some((id, session)) => (Some(id), session),
        None => (None, MemorySession::new()),
    };

    let url = state.auth.logout(&session).await;

    if let Some(id) = id {
        state.sessions.remove(&id);
        info!("Session closed");
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(&url))
}

async fn logout_landing() -> Redirect {
    Redirect::to("/")
}
