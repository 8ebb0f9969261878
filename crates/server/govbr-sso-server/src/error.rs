use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use govbr_oauth2::OAuth2Error;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] OAuth2Error),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Auth(err) if err.is_security_violation() => {
                (StatusCode::BAD_REQUEST, "Requisição de login inválida")
            }
            AppError::Auth(OAuth2Error::MissingAuthorizationCode) => {
                (StatusCode::BAD_REQUEST, "Requisição de login inválida")
            }
            AppError::Auth(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha na autenticação com o Gov.br",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Details stay in the logs; the body is generic
        if status.is_server_error() {
            error!(error = %self, "Authentication failed");
        } else {
            warn!(error = %self, "Rejected login request");
        }

        let body = json!({
            "error": message,
            "code": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
