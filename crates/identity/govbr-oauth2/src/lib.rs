//! Gov.br OAuth2 / OpenID Connect client with PKCE support.
//!
//! This crate implements the Authorization Code flow against the Gov.br identity provider
//! without an external OAuth client library: login URL generation with `state`, `nonce` and a
//! PKCE challenge, callback validation and code exchange, userinfo retrieval, and the
//! session-backed identity lookup and logout.
//!
//! The host supplies the session mechanism through [`SessionContext`] and may substitute the
//! outbound HTTP capability through [`HttpClient`].

mod config;
mod error;
mod http;
mod pkce;
mod service;
mod session;
mod token;
mod types;


pub use config::{GovBrConfig, ProviderEndpoints};
pub use error::{OAuth2Error, OAuth2Result};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use pkce::PkceChallenge;
pub use service::{AuthService, GovBrAuthService, POST_LOGIN_REDIRECT};
pub use session::{MemorySession, SecurityContext, SessionContext};
pub use token::generate_security_token;
pub use types::{CallbackOutcome, CallbackParams, ErrorPayload, GovBrUser, TokenResponse};
