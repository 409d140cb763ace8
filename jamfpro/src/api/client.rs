use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, COOKIE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::auth::TokenManager;
use super::common::{ApiErrorDetails, ApiErrorResponse};
use super::error::ApiError;
use crate::config::ProviderConfig;

/// Jamf Pro API client
///
/// Each call is a single HTTP request. Retrying is left to the callers in
/// `crate::crud`, which know whether the operation tolerates it.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
    hide_sensitive_data: bool,
    mandatory_request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_idle_connections: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            max_idle_connections: 10,
        }
    }
}

impl Client {
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        Self::with_settings(config, HttpSettings::default())
    }

    pub fn with_settings(
        config: &ProviderConfig,
        settings: HttpSettings,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if !config.custom_cookies.is_empty() {
            let cookies = config
                .custom_cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&cookies)
                .map_err(|e| ApiError::ParseError(format!("invalid custom cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connection_timeout)
            .pool_idle_timeout(settings.idle_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .build()?;

        let base_url = config.instance_url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                tokens: TokenManager::new(config.auth.clone(), config.token_refresh_buffer),
                hide_sensitive_data: config.hide_sensitive_data,
                mandatory_request_delay: config.mandatory_request_delay,
                last_request: Mutex::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Buildings API operations
    pub fn buildings(&self) -> crate::api::buildings::BuildingsApi<'_> {
        crate::api::buildings::BuildingsApi::new(self)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        self.parse_success_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        self.parse_success_response(response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        self.parse_success_response(response).await
    }

    /// DELETE returns no body on success
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        self.wait_for_request_slot().await;

        let token = self
            .inner
            .tokens
            .token(&self.inner.http_client, &self.inner.base_url)
            .await?;

        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!("{} request to: {}", method, url);

        let mut request = self
            .inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, format!("Bearer {}", token));

        if let Some(body) = body {
            if !self.inner.hide_sensitive_data {
                if let Ok(json) = serde_json::to_string(body) {
                    tracing::debug!("Request body: {}", json);
                }
            }
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.inner.tokens.invalidate().await;
        }

        Err(self.handle_error_response(response).await)
    }

    /// Space requests at least `mandatory_request_delay` apart
    async fn wait_for_request_slot(&self) {
        let mut last = self.inner.last_request.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.inner.mandatory_request_delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }

    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        if !self.inner.hide_sensitive_data {
            tracing::debug!("API response body: {}", text);
        }

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}", e);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let details = serde_json::from_str::<ApiErrorResponse>(&text)
            .ok()
            .map(|parsed| ApiErrorDetails {
                errors: parsed.errors,
            });

        let message = match details.as_ref().map(ApiErrorDetails::summary) {
            Some(summary) if !summary.is_empty() => summary,
            _ if text.is_empty() => reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown error")
                .to_string(),
            _ => text,
        };

        tracing::debug!(status, "API error response: {}", message);

        ApiError::ApiError {
            status,
            message,
            details: details.map(Box::new),
        }
    }
}
