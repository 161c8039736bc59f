//! WhatsApp gateway client
//!
//! Two operations, `sendText` and `sendMedia`, against an instance-scoped
//! HTTP endpoint. Retries are a dispatcher/operator concern, never handled
//! here.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;
use zapline_common::types::InstanceId;

pub use client::EvoGatewayClient;

/// Routing info for one gateway instance
#[derive(Debug, Clone)]
pub struct InstanceRef {
    pub instance_id: InstanceId,
    pub base_url: String,
    /// Instance-level key; falls back to the configured default when absent
    pub api_key: Option<String>,
}

/// Parsed gateway response for a successful send
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Gateway-assigned message id, when the response carries one
    pub message_id: Option<String>,
    /// Raw response body, persisted with the target
    pub payload: serde_json::Value,
}

/// Gateway client errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("gateway request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// Send operations offered by the gateway.
///
/// A trait seam so the dispatch worker can be exercised without HTTP.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a plain text message
    async fn send_text(
        &self,
        instance: &InstanceRef,
        number: &str,
        text: &str,
    ) -> Result<SendReceipt, GatewayError>;

    /// Send a media message with an optional caption
    async fn send_media(
        &self,
        instance: &InstanceRef,
        number: &str,
        media_url: &str,
        caption: Option<&str>,
    ) -> Result<SendReceipt, GatewayError>;
}
