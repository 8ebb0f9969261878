//! Gov.br login flow: authorization request, callback, identity lookup and logout.

use crate::config::{GovBrConfig, ProviderEndpoints};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::pkce::PkceChallenge;
use crate::session::{SecurityContext, SessionContext};
use crate::types::{
    CallbackOutcome, CallbackParams, ErrorPayload, GovBrUser, IdTokenClaims, TokenResponse,
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where the browser goes after a successful login.
pub const POST_LOGIN_REDIRECT: &str = "/";

/// Operations the web layer calls into.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Start a login attempt and return the provider authorization URL.
    async fn build_login_url(&self, session: &dyn SessionContext) -> OAuth2Result<String>;

    /// Complete a login attempt from the provider redirect.
    async fn handle_callback(
        &self,
        params: CallbackParams,
        session: &dyn SessionContext,
    ) -> OAuth2Result<CallbackOutcome>;

    /// The authenticated user of this session, if any.
    async fn get_user(&self, session: &dyn SessionContext) -> Option<GovBrUser>;

    /// End the local session and return the provider end-session URL.
    async fn logout(&self, session: &dyn SessionContext) -> String;
}

/// Authorization Code + PKCE client for Gov.br.
#[derive(Clone)]
pub struct GovBrAuthService {
    config: Arc<GovBrConfig>,
    endpoints: ProviderEndpoints,
    http_client: Arc<dyn HttpClient>,
}

impl GovBrAuthService {
    /// Build the service with a reqwest client bounded by `http_timeout_seconds`.
    pub fn new(config: GovBrConfig) -> OAuth2Result<Self> {
        let http_client = Arc::new(ReqwestHttpClient::new(config.http_timeout_seconds)?);
        Self::with_http_client(config, http_client)
    }

    pub fn with_http_client(
        config: GovBrConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> OAuth2Result<Self> {
        config.validate()?;
        let endpoints = config.endpoints()?;

        Ok(Self {
            config: Arc::new(config),
            endpoints,
            http_client,
        })
    }

    pub fn config(&self) -> &GovBrConfig {
        &self.config
    }

    fn basic_credentials(&self) -> String {
        let credentials = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }

    /// Take the pending login attempt and check it against the returned `state`.
    async fn consume_security_context(
        &self,
        returned_state: Option<&str>,
        session: &dyn SessionContext,
    ) -> OAuth2Result<SecurityContext> {
        let context = session.take_security_context().await?;

        let context = match (context, returned_state) {
            (Some(context), Some(state)) if context.state == state => context,
            (None, _) => {
                warn!("Callback received without a pending login attempt");
                return Err(OAuth2Error::state_mismatch());
            }
            _ => {
                warn!("Callback state does not match the pending login attempt");
                return Err(OAuth2Error::state_mismatch());
            }
        };

        if context.is_expired(self.config.state_ttl_seconds) {
            warn!("Callback received for an expired login attempt");
            return Err(OAuth2Error::SecurityViolation(
                "login attempt expired".to_string(),
            ));
        }

        Ok(context)
    }

    /// Exchange the authorization code for tokens
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> OAuth2Result<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http_client
            .post_form(&self.endpoints.token, &self.basic_credentials(), &form)
            .await
            .map_err(|e| {
                error!("Token request failed: {}", e);
                OAuth2Error::TokenExchangeFailed {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let failed = |response: &crate::http::HttpResponse| OAuth2Error::TokenExchangeFailed {
            status: Some(response.status),
            body: response.body.clone(),
        };

        if !response.is_success() {
            error!(
                "Token exchange failed with status {}: {}",
                response.status, response.body
            );
            return Err(failed(&response));
        }

        let token_response: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            error!("Token response is not valid JSON: {}", e);
            failed(&response)
        })?;

        match &token_response.access_token {
            Some(token) if !token.is_empty() => {}
            _ => {
                error!("Token response carries no access_token");
                return Err(failed(&response));
            }
        }

        info!("Successfully exchanged code for tokens");
        Ok(token_response)
    }

    /// Check the `nonce` claim of the ID token against the one sent with the authorization request.
    ///
    /// The ID token comes straight from the token endpoint over TLS, so only its claims are read.
    fn verify_nonce(&self, id_token: &str, expected_nonce: &str) -> OAuth2Result<()> {
        let header = decode_header(id_token).map_err(|e| {
            warn!("ID token header is malformed: {}", e);
            OAuth2Error::SecurityViolation("malformed id_token".to_string())
        })?;

        let mut validation = Validation::new(header.alg);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<IdTokenClaims>(id_token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| {
                warn!("ID token claims could not be decoded: {}", e);
                OAuth2Error::SecurityViolation("malformed id_token".to_string())
            })?
            .claims;

        if claims.nonce.as_deref() != Some(expected_nonce) {
            warn!("ID token nonce does not match the pending login attempt");
            return Err(OAuth2Error::SecurityViolation("nonce mismatch".to_string()));
        }

        Ok(())
    }

    /// Get user info using the access token
    async fn fetch_user_info(&self, access_token: &str) -> OAuth2Result<GovBrUser> {
        let authorization = format!("Bearer {}", access_token);
        let response = self
            .http_client
            .get(&self.endpoints.userinfo, &authorization)
            .await
            .map_err(|e| {
                error!("User info request failed: {}", e);
                OAuth2Error::UserInfoFailed(e.to_string())
            })?;

        if !response.is_success() {
            error!("User info request failed with status {}", response.status);
            return Err(OAuth2Error::UserInfoFailed(format!(
                "status {}",
                response.status
            )));
        }

        let user = serde_json::from_str::<Value>(&response.body)
            .map_err(OAuth2Error::from)
            .and_then(GovBrUser::from_record)
            .map_err(|e| {
                error!("User info response could not be decoded: {}", e);
                OAuth2Error::UserInfoFailed(e.to_string())
            })?;

        debug!("Retrieved user info");
        Ok(user)
    }
}

#[async_trait]
impl AuthService for GovBrAuthService {
    async fn build_login_url(&self, session: &dyn SessionContext) -> OAuth2Result<String> {
        let pkce = PkceChallenge::new();
        let context = SecurityContext::new(&pkce);

        let mut url = self.endpoints.authorization.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &self.config.scopes)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("nonce", &context.nonce)
            .append_pair("state", &context.state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", &pkce.code_challenge_method);

        session.store_security_context(context).await?;

        info!("Redirecting to authorization endpoint {}", self.endpoints.authorization);
        Ok(url.to_string())
    }

    async fn handle_callback(
        &self,
        params: CallbackParams,
        session: &dyn SessionContext,
    ) -> OAuth2Result<CallbackOutcome> {
        if let Some(error) = params.error {
            error!(
                "Provider reported an error: {} ({})",
                error,
                params.error_description.as_deref().unwrap_or("no description")
            );
            if let Err(e) = session.take_security_context().await {
                warn!("Could not discard the pending login attempt: {}", e);
            }
            return Ok(CallbackOutcome::ProviderError(ErrorPayload {
                error,
                error_description: params.error_description,
                state: params.state,
            }));
        }

        let context = self
            .consume_security_context(params.state.as_deref(), session)
            .await?;

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(OAuth2Error::MissingAuthorizationCode)?;

        let tokens = self.exchange_code(&code, &context.code_verifier).await?;

        if let Some(id_token) = &tokens.id_token {
            self.verify_nonce(id_token, &context.nonce)?;
        }

        let access_token = tokens.access_token.as_deref().unwrap_or_default();
        let user = self.fetch_user_info(access_token).await?;

        session.store_user(user.to_session_value()?).await?;

        info!("User authenticated");
        debug!("Authenticated subject {}", user.subject);
        Ok(CallbackOutcome::Redirect(POST_LOGIN_REDIRECT.to_string()))
    }

    async fn get_user(&self, session: &dyn SessionContext) -> Option<GovBrUser> {
        let stored = match session.load_user().await {
            Ok(stored) => stored?,
            Err(e) => {
                error!("Error reading user from session: {}", e);
                return None;
            }
        };

        match GovBrUser::from_session_value(stored) {
            Ok(user) => Some(user),
            Err(e) => {
                error!("Error deserializing user from session: {}", e);
                None
            }
        }
    }

    async fn logout(&self, session: &dyn SessionContext) -> String {
        if let Err(e) = session.invalidate().await {
            warn!("Session invalidation failed: {}", e);
        }

        let mut url = self.endpoints.end_session.clone();
        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", &self.config.logout_uri);

        debug!("Session invalidated, redirecting to end-session endpoint");
        url.to_string()
    }
}
