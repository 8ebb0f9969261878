//! OAuth2 error types.

use thiserror::Error;

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The callback could not be tied to a login attempt started by this session.
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    /// `status` is `None` when the request never produced a response (transport error, timeout).
    #[error("Token exchange failed (status {status:?}): {body}")]
    TokenExchangeFailed { status: Option<u16>, body: String },

    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl OAuth2Error {
    pub fn state_mismatch() -> Self {
        Self::SecurityViolation("state mismatch".to_string())
    }

    /// Whether the error is a forged or replayed callback rather than a provider/infra failure.
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation(_))
    }
}
