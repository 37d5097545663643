//! Authorization-code exchange against the accounts service

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::AuthError;

/// Form body of an authorization-code grant with PKCE
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
    pub client_id: String,
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

impl TokenRequest {
    pub fn form(&self) -> [(&'static str, &str); 5] {
        [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", self.code.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", self.code_verifier.as_str()),
        ]
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError>;
}

/// Token endpoint reached over HTTPS with reqwest
#[derive(Clone)]
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    token_url: Url,
}

impl HttpTokenEndpoint {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(config: &Config) -> Result<Self, AuthError> {
        Self::with_url(config.token_url.clone())
    }

    pub fn with_url(token_url: Url) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| AuthError::ExchangeFailed {
                detail: format!("http client: {e}"),
            })?;
        Ok(Self { client, token_url })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        tracing::debug!(url = %self.token_url, "Exchanging authorization code");

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&request.form())
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeFailed {
                detail: format!("HTTP {status}: {body}"),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::ExchangeFailed {
                detail: format!("malformed token response: {e}"),
            })
    }
}
