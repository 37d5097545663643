//! PKCE login flow against the accounts service
//!
//! The pending verifier and CSRF state live in session storage between
//! `begin_login` and `complete_login`, exactly like a browser tab would keep
//! them across the redirect. Both are single use.

mod callback;
mod pkce;
mod token_endpoint;

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use url::Url;

use crate::config::Config;
use crate::error::AuthError;
use crate::model::{keys, AccessToken, Clock, Storage};

pub use callback::CallbackParams;
pub use pkce::{code_challenge, generate_code_verifier, generate_state, VERIFIER_LEN};
pub use token_endpoint::{HttpTokenEndpoint, TokenEndpoint, TokenRequest, TokenResponse};

#[derive(Clone)]
pub struct AuthSession {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
}

impl AuthSession {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn Storage>,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            storage,
            endpoint,
            clock,
        }
    }

    /// Start a login: persist a fresh verifier/state pair and return the URL
    /// the user has to open. Any pending login is replaced.
    pub async fn begin_login(&self) -> Result<Url, AuthError> {
        let verifier = generate_code_verifier();
        let challenge = code_challenge(&verifier);
        let state = generate_state();

        self.storage.set(keys::CODE_VERIFIER, &verifier).await?;
        self.storage.set(keys::AUTH_STATE, &state).await?;

        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope())
            .append_pair("show_dialog", "true")
            .append_pair("state", &state)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &challenge);

        tracing::info!(scopes = self.config.scopes.len(), "Login started");
        Ok(url)
    }

    /// Finish a login from the redirect parameters and persist the token.
    ///
    /// Any failure also drops a previously stored access token: a broken
    /// login leaves the session logged out.
    pub async fn complete_login(&self, params: &CallbackParams) -> Result<AccessToken, AuthError> {
        match self.exchange(params).await {
            Ok(token) => {
                tracing::info!(expires_at = %token.expires_at(), "Login completed");
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                if let Err(storage) = self.invalidate().await {
                    tracing::warn!(error = %storage, "Could not drop stored token");
                }
                Err(e)
            }
        }
    }

    async fn exchange(&self, params: &CallbackParams) -> Result<AccessToken, AuthError> {
        if let Some(error) = &params.error {
            self.clear_pending().await?;
            return Err(AuthError::ProviderRejected {
                error: error.clone(),
            });
        }

        let expected = self.storage.get(keys::AUTH_STATE).await;
        match (expected.as_deref(), params.state.as_deref()) {
            (Some(expected), Some(returned)) if expected == returned => {}
            _ => return Err(AuthError::CsrfMismatch),
        }
        self.storage.remove(keys::AUTH_STATE).await?;

        let code = params.code.clone().ok_or(AuthError::MissingCode)?;

        let verifier = self.storage.get(keys::CODE_VERIFIER).await;
        self.storage.remove(keys::CODE_VERIFIER).await?;
        let code_verifier = verifier.ok_or_else(|| AuthError::ExchangeFailed {
            detail: "no pending code verifier".to_string(),
        })?;

        let request = TokenRequest {
            client_id: self.config.client_id.clone(),
            code,
            redirect_uri: self.config.redirect_uri.clone(),
            code_verifier,
        };
        let response = self.endpoint.exchange(&request).await?;

        let expires_at = Duration::try_seconds(response.expires_in)
            .filter(|lifetime| *lifetime >= Duration::zero())
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::ExchangeFailed {
                detail: format!("unusable token lifetime: {}s", response.expires_in),
            })?;
        self.storage
            .set(keys::ACCESS_TOKEN, &response.access_token)
            .await?;
        self.storage
            .set(keys::TOKEN_EXPIRATION, &expires_at.timestamp_millis().to_string())
            .await?;

        Ok(AccessToken::new(response.access_token, expires_at))
    }

    /// The persisted token if it has not expired. Expired tokens are dropped.
    pub async fn access_token(&self) -> Option<AccessToken> {
        let secret = self.storage.get(keys::ACCESS_TOKEN).await?;
        let expires_at = self
            .storage
            .get(keys::TOKEN_EXPIRATION)
            .await
            .and_then(|ms| parse_expiration(&ms));

        let token = match expires_at {
            Some(expires_at) => AccessToken::new(secret, expires_at),
            None => {
                tracing::warn!("Stored token has no usable expiration");
                if let Err(e) = self.invalidate().await {
                    tracing::warn!(error = %e, "Could not drop unusable token");
                }
                return None;
            }
        };

        if token.is_expired(self.clock.now()) {
            tracing::info!(expired_at = %token.expires_at(), "Access token expired");
            if let Err(e) = self.invalidate().await {
                tracing::warn!(error = %e, "Could not drop expired token");
            }
            return None;
        }
        Some(token)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Forget the token and any pending login.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.invalidate().await?;
        self.clear_pending().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    async fn invalidate(&self) -> Result<(), AuthError> {
        self.storage.remove(keys::ACCESS_TOKEN).await?;
        self.storage.remove(keys::TOKEN_EXPIRATION).await?;
        Ok(())
    }

    async fn clear_pending(&self) -> Result<(), AuthError> {
        self.storage.remove(keys::CODE_VERIFIER).await?;
        self.storage.remove(keys::AUTH_STATE).await?;
        Ok(())
    }
}

fn parse_expiration(ms: &str) -> Option<DateTime<Utc>> {
    let ms = ms.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}
