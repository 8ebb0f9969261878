//! OAuth2 / OIDC protocol types and the Gov.br identity record.

use crate::error::{OAuth2Error, OAuth2Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Citizen identity as returned by the Gov.br `/userinfo` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovBrUser {
    /// CPF of the authenticated citizen.
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "profile", default)]
    pub profile_url: Option<String>,
    /// Protected resource; fetching it needs the access token.
    #[serde(rename = "picture", default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub phone_number_verified: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl GovBrUser {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            name: None,
            profile_url: None,
            picture_url: None,
            email: None,
            email_verified: false,
            phone_number: None,
            phone_number_verified: false,
        }
    }

    /// Decode a stored session entry.
    ///
    /// Session backends hand the entry back either as a structured object (typed record or
    /// generic field map) or as serialized JSON text; both go through the same decoder.
    pub fn from_session_value(value: Value) -> OAuth2Result<Self> {
        let value = match value {
            Value::String(text) => serde_json::from_str(&text)?,
            other => other,
        };
        Self::from_record(value)
    }

    /// Decode an identity record. Only JSON objects with a non-empty `sub` qualify.
    pub(crate) fn from_record(value: Value) -> OAuth2Result<Self> {
        let Value::Object(_) = &value else {
            return Err(OAuth2Error::SessionError(
                "identity record is not a JSON object".to_string(),
            ));
        };

        let user: GovBrUser = serde_json::from_value(value)?;
        if user.subject.is_empty() {
            return Err(OAuth2Error::SessionError(
                "identity record has an empty subject".to_string(),
            ));
        }
        Ok(user)
    }

    /// Structured form written into the session.
    pub fn to_session_value(&self) -> OAuth2Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Query parameters of the provider redirect back to the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Provider-reported failure, passed through to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub error_description: Option<String>,
    pub state: Option<String>,
}

/// Result of a callback that did not fail on our side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Login completed; send the browser here.
    Redirect(String),
    /// The provider refused the authorization (e.g. the user declined consent).
    ProviderError(ErrorPayload),
}

/// OAuth2 token response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// The ID token claims this client looks at.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdTokenClaims {
    #[serde(default)]
    pub nonce: Option<String>,
}
