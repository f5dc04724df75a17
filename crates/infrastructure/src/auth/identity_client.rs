//! `OAuth2` token endpoint client.
//!
//! Speaks the form-encoded token endpoint protocol for the
//! `client_credentials`, `password` and `refresh_token` grants.

use std::time::Duration;

use async_trait::async_trait;
use clinic_session_application::ports::IdentityClient;
use clinic_session_domain::{Credential, ExchangeFailure, IssuedToken, TokenGrant};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::SessionConfig;

/// Content-Type for form-urlencoded data.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `OAuth2` token response from token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    refresh_expires_in: u64,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// `OAuth2` error response.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Identity provider client backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestIdentityClient {
    http_client: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl ReqwestIdentityClient {
    /// Create a client for `token_url`.
    ///
    /// `timeout` bounds the whole request, body included.
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(
        token_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Create a client from the loaded configuration.
    ///
    /// # Errors
    /// Same as [`Self::new`].
    pub fn from_config(config: &SessionConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.token_endpoint.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.exchange_timeout(),
        )
    }

    fn form_params<'a>(&'a self, grant: &'a TokenGrant) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![
            ("grant_type", grant.grant_type()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        match grant {
            TokenGrant::ClientCredentials => {}
            TokenGrant::Password { username, password } => {
                params.push(("username", username.as_str()));
                params.push(("password", password.as_str()));
            }
            TokenGrant::RefreshToken(token) => params.push(("refresh_token", token.as_str())),
        }
        params
    }
}

impl std::fmt::Debug for ReqwestIdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestIdentityClient")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

fn request_failure(err: &reqwest::Error) -> ExchangeFailure {
    if err.is_timeout() {
        ExchangeFailure::Timeout
    } else {
        ExchangeFailure::Transport(err.to_string())
    }
}

fn rejection(status: u16, body: &str) -> ExchangeFailure {
    let message = match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(error_response) => error_response
            .error_description
            .unwrap_or(error_response.error),
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    };
    ExchangeFailure::Status { status, message }
}

fn parse_token_response(body: &[u8]) -> Result<IssuedToken, ExchangeFailure> {
    let token_response: TokenResponse = serde_json::from_slice(body)
        .map_err(|e| ExchangeFailure::MalformedResponse(e.to_string()))?;

    let credential = Credential::from_parts(
        Some(token_response.access_token),
        Some(token_response.refresh_token),
    )
    .ok_or_else(|| ExchangeFailure::MalformedResponse("empty token in response".to_string()))?;

    let scopes: Vec<String> = token_response
        .scope
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    Ok(IssuedToken {
        credential,
        expires_in: token_response.expires_in,
        refresh_expires_in: token_response.refresh_expires_in,
        token_type: token_response.token_type,
        scopes,
    })
}

#[async_trait]
impl IdentityClient for ReqwestIdentityClient {
    async fn exchange(&self, grant: &TokenGrant) -> Result<IssuedToken, ExchangeFailure> {
        let body = serde_urlencoded::to_string(self.form_params(grant))
            .map_err(|e| ExchangeFailure::Transport(format!("Failed to encode form: {e}")))?;

        debug!(url = %self.token_url, grant = grant.grant_type(), "posting token request");
        let response = self
            .http_client
            .post(self.token_url.clone())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| request_failure(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &error_text));
        }

        let bytes = response.bytes().await.map_err(|e| request_failure(&e))?;
        parse_token_response(&bytes)
    }
}
