//! Gov.br client configuration.

use crate::error::{OAuth2Error, OAuth2Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Client registration and endpoints for the Gov.br provider.
///
/// Accepts both snake_case keys and the kebab-case property names used by
/// existing Gov.br deployments (`url-provider`, `client-id`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovBrConfig {
    /// Base URL of the provider; `/authorize`, `/token`, `/userinfo` and `/logout` hang off it.
    #[serde(alias = "url-provider")]
    pub url_provider: String,
    /// Base URL of this application.
    #[serde(alias = "url-service", default)]
    pub url_service: String,
    #[serde(alias = "redirect-uri")]
    pub redirect_uri: String,
    /// Space-delimited scope list, sent verbatim.
    pub scopes: String,
    #[serde(alias = "client-id")]
    pub client_id: String,
    #[serde(alias = "client-secret")]
    pub client_secret: String,
    #[serde(alias = "logout-uri")]
    pub logout_uri: String,
    /// Seconds a pending login attempt stays valid.
    #[serde(alias = "state-ttl-seconds", default = "default_state_ttl")]
    pub state_ttl_seconds: u64,
    /// Upper bound for each provider call.
    #[serde(alias = "http-timeout-seconds", default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

fn default_state_ttl() -> u64 {
    600 // 10 minutes
}

fn default_http_timeout() -> u64 {
    30
}

impl GovBrConfig {
    pub fn new(
        url_provider: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        logout_uri: impl Into<String>,
    ) -> Self {
        Self {
            url_provider: url_provider.into(),
            url_service: String::new(),
            redirect_uri: redirect_uri.into(),
            scopes: "openid".to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            logout_uri: logout_uri.into(),
            state_ttl_seconds: default_state_ttl(),
            http_timeout_seconds: default_http_timeout(),
        }
    }

    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    pub fn with_url_service(mut self, url_service: impl Into<String>) -> Self {
        self.url_service = url_service.into();
        self
    }

    pub fn with_state_ttl(mut self, seconds: u64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    /// Check that every required value is present and the URLs parse.
    pub fn validate(&self) -> OAuth2Result<()> {
        let required = [
            ("url-provider", &self.url_provider),
            ("redirect-uri", &self.redirect_uri),
            ("scopes", &self.scopes),
            ("client-id", &self.client_id),
            ("client-secret", &self.client_secret),
            ("logout-uri", &self.logout_uri),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(OAuth2Error::ConfigError(format!("{} is required", name)));
            }
        }

        Url::parse(&self.url_provider)?;
        Url::parse(&self.redirect_uri)?;
        Url::parse(&self.logout_uri)?;

        if self.http_timeout_seconds == 0 {
            return Err(OAuth2Error::ConfigError(
                "http-timeout-seconds must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the provider endpoints from `url_provider`.
    pub fn endpoints(&self) -> OAuth2Result<ProviderEndpoints> {
        let base = self.url_provider.trim_end_matches('/');
        Ok(ProviderEndpoints {
            authorization: Url::parse(&format!("{}/authorize", base))?,
            token: Url::parse(&format!("{}/token", base))?,
            userinfo: Url::parse(&format!("{}/userinfo", base))?,
            end_session: Url::parse(&format!("{}/logout", base))?,
        })
    }
}

/// Provider endpoints, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorization: Url,
    pub token: Url,
    pub userinfo: Url,
    pub end_session: Url,
}
