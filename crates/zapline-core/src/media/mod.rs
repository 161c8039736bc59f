//! Media reference resolution
//!
//! Campaign media is stored privately; the gateway fetches it by URL, so
//! stored paths are exchanged for time-limited signed URLs before sending.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use zapline_common::config::MediaConfig;
use zapline_common::{Error, Result};

/// Resolves a stored media path to a URL the gateway can fetch
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, path: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

/// Client for the storage service's URL-signing endpoint
pub struct SignedUrlClient {
    http: Client,
    base_url: String,
    api_key: String,
    ttl_secs: u64,
}

impl SignedUrlClient {
    /// Create a new signing client from configuration
    pub fn new(config: &MediaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Media(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            ttl_secs: config.effective_ttl_secs(),
        })
    }
}

#[async_trait]
impl MediaResolver for SignedUrlClient {
    async fn resolve(&self, path: &str) -> Result<String> {
        let url = format!("{}/object/sign", self.base_url);
        let body = serde_json::json!({
            "path": path,
            "expires_in": self.ttl_secs,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Media(format!("Signing request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Media(format!(
                "Signing failed: HTTP {}",
                status.as_u16()
            )));
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| Error::Media(format!("Malformed signing response: {}", e)))?;

        debug!("Signed media URL issued for {}", path);
        Ok(signed.signed_url)
    }
}
