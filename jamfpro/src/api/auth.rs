//! Bearer token acquisition and caching

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

use super::error::ApiError;
use crate::config::AuthMethod;

pub const OAUTH_TOKEN_PATH: &str = "/api/oauth/token";
pub const BASIC_TOKEN_PATH: &str = "/api/v1/auth/token";

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct BasicTokenResponse {
    token: String,
    expires: DateTime<Utc>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct TokenManager {
    auth: AuthMethod,
    refresh_buffer: TimeDelta,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(auth: AuthMethod, refresh_buffer: Duration) -> Self {
        let refresh_buffer =
            TimeDelta::from_std(refresh_buffer).unwrap_or_else(|_| TimeDelta::zero());

        Self {
            auth,
            refresh_buffer,
            cached: Mutex::new(None),
        }
    }

    /// Cached token, or a fresh one once the cached token is inside the refresh buffer
    pub async fn token(
        &self,
        http_client: &reqwest::Client,
        base_url: &str,
    ) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - self.refresh_buffer > Utc::now() {
                return Ok(token.value.clone());
            }
            tracing::debug!(
                expires_at = %token.expires_at,
                "Token within refresh buffer, refreshing"
            );
        }

        let token = self.fetch(http_client, base_url).await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    /// Forget the cached token so the next request fetches a new one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(
        &self,
        http_client: &reqwest::Client,
        base_url: &str,
    ) -> Result<CachedToken, ApiError> {
        tracing::debug!(auth_method = self.auth.name(), "Requesting new API token");

        match &self.auth {
            AuthMethod::OAuth2 {
                client_id,
                client_secret,
            } => {
                let url = format!("{}{}", base_url, OAUTH_TOKEN_PATH);
                let response = http_client
                    .post(&url)
                    .form(&[
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("grant_type", "client_credentials"),
                    ])
                    .send()
                    .await?;

                let body: OAuthTokenResponse = parse_token_response(response).await?;
                let lifetime =
                    TimeDelta::try_seconds(body.expires_in).unwrap_or_else(TimeDelta::zero);

                Ok(CachedToken {
                    value: body.access_token,
                    expires_at: Utc::now() + lifetime,
                })
            }
            AuthMethod::Basic { username, password } => {
                let url = format!("{}{}", base_url, BASIC_TOKEN_PATH);
                let response = http_client
                    .post(&url)
                    .basic_auth(username, Some(password))
                    .send()
                    .await?;

                let body: BasicTokenResponse = parse_token_response(response).await?;

                Ok(CachedToken {
                    value: body.token,
                    expires_at: body.expires,
                })
            }
        }
    }
}

async fn parse_token_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::AuthError {
            status: status.as_u16(),
            message: text,
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| ApiError::ParseError(format!("invalid token response: {}", e)))
}
