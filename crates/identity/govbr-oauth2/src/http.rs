//! HTTP capability for talking to the provider.

use crate::error::OAuth2Result;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::time::Duration;
use url::Url;

/// Status and raw body of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound calls made by the login flow.
///
/// Transport failures (connect errors, timeouts) are errors; any HTTP status is a response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST an `application/x-www-form-urlencoded` body.
    async fn post_form(
        &self,
        url: &Url,
        authorization: &str,
        form: &[(&str, &str)],
    ) -> OAuth2Result<HttpResponse>;

    async fn get(&self, url: &Url, authorization: &str) -> OAuth2Result<HttpResponse>;
}

/// [`HttpClient`] backed by reqwest, with a per-request timeout.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(http_timeout_seconds: u64) -> OAuth2Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http_timeout_seconds))
            .build()?;

        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> OAuth2Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_form(
        &self,
        url: &Url,
        authorization: &str,
        form: &[(&str, &str)],
    ) -> OAuth2Result<HttpResponse> {
        let response = self
            .client
            .post(url.as_str())
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        Self::read(response).await
    }

    async fn get(&self, url: &Url, authorization: &str) -> OAuth2Result<HttpResponse> {
        let response = self
            .client
            .get(url.as_str())
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuth2Error;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_form_encodes_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("Authorization", "Basic YWJjOnNlY3JldA=="))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .and(body_string("a=1&redirect_uri=https%3A%2F%2Fapp.test%2Fopenid"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ReqwestHttpClient::new(5).unwrap();
        let url = Url::parse(&format!("{}/token", mock_server.uri())).unwrap();
        let response = client
            .post_form(
                &url,
                "Basic YWJjOnNlY3JldA==",
                &[("a", "1"), ("redirect_uri", "https://app.test/openid")],
            )
            .await
            .unwrap();

        assert_eq!(response, HttpResponse { status: 200, body: "ok".to_string() });
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .mount(&mock_server)
            .await;

        let client = ReqwestHttpClient::new(5).unwrap();
        let url = Url::parse(&format!("{}/userinfo", mock_server.uri())).unwrap();
        let response = client.get(&url, "Bearer t").await.unwrap();

        assert_eq!(response.status, 401);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let client = ReqwestHttpClient::new(1).unwrap();
        let url = Url::parse(&format!("{}/userinfo", mock_server.uri())).unwrap();
        let result = client.get(&url, "Bearer t").await;

        assert!(matches!(result, Err(OAuth2Error::HttpError(e)) if e.is_timeout()));
    }
}
