//! Validation endpoint client

use crate::config::ApiConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Asks the backend whether a scanned pass is valid.
///
/// Implementations return the response body as loosely-typed JSON; reading
/// it is left to `interpret::classify`.
#[async_trait]
pub trait ValidationClient: Send + Sync {
    async fn validate(&self, raw_payload: &str, credential: &str) -> Result<Value, ApiError>;
}

pub struct HttpValidationClient {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpValidationClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let url = Self::endpoint_url(&config.base_url, &config.validate_path)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::InvalidEndpoint {
                details: format!("Failed to build HTTP client: {}", e),
            })?;

        info!("Validation endpoint: {}", url);
        Ok(Self { client, url })
    }

    /// Join base URL and path without doubling or dropping the slash
    fn endpoint_url(base_url: &str, path: &str) -> Result<reqwest::Url, ApiError> {
        let joined = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        reqwest::Url::parse(&joined).map_err(|e| ApiError::InvalidEndpoint {
            details: format!("{}: {}", joined, e),
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

#[async_trait]
impl ValidationClient for HttpValidationClient {
    async fn validate(&self, raw_payload: &str, credential: &str) -> Result<Value, ApiError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(credential)
            .json(&json!({ "qrData": raw_payload }))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "validate_qr_transport_error");
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Transport(e)
                }
            })?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            status = %status.as_u16(),
            latency_ms = %latency_ms,
            "validate_qr_response"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Validation endpoint returned {}: {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Transport(e)
            }
        })?;
        debug!("Validation response body: {} bytes", body.len());

        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody {
            details: e.to_string(),
        })
    }
}
