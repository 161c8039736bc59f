//! HTTP implementation of the gateway client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use zapline_common::config::GatewayConfig;
use zapline_common::{Error, Result};

use super::{Gateway, GatewayError, InstanceRef, SendReceipt};

/// Evolution-style WhatsApp gateway client
pub struct EvoGatewayClient {
    http: Client,
    default_api_key: String,
}

impl EvoGatewayClient {
    /// Create a new gateway client from configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Gateway(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            default_api_key: config.api_key.clone(),
        })
    }

    async fn post(
        &self,
        instance: &InstanceRef,
        operation: &str,
        body: serde_json::Value,
    ) -> std::result::Result<SendReceipt, GatewayError> {
        let url = format!(
            "{}/message/{}/{}",
            instance.base_url.trim_end_matches('/'),
            operation,
            instance.instance_id
        );
        let api_key = instance
            .api_key
            .as_deref()
            .unwrap_or(&self.default_api_key);

        let response = self
            .http
            .post(&url)
            .header("apikey", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let payload: serde_json::Value = response.json().await?;
            let message_id = payload
                .get("messageId")
                .or_else(|| payload.get("id"))
                .and_then(|v| v.as_str())
                .map(String::from);

            debug!("Gateway {} accepted (message id: {:?})", operation, message_id);
            Ok(SendReceipt {
                message_id,
                payload,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

            Err(GatewayError::Gateway {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl Gateway for EvoGatewayClient {
    async fn send_text(
        &self,
        instance: &InstanceRef,
        number: &str,
        text: &str,
    ) -> std::result::Result<SendReceipt, GatewayError> {
        let body = serde_json::json!({
            "number": number,
            "text": text,
        });
        self.post(instance, "sendText", body).await
    }

    async fn send_media(
        &self,
        instance: &InstanceRef,
        number: &str,
        media_url: &str,
        caption: Option<&str>,
    ) -> std::result::Result<SendReceipt, GatewayError> {
        let mut body = serde_json::json!({
            "number": number,
            "media": media_url,
        });
        if let Some(caption) = caption {
            body["caption"] = serde_json::json!(caption);
        }
        self.post(instance, "sendMedia", body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(key: &str) -> EvoGatewayClient {
        EvoGatewayClient::new(&GatewayConfig {
            api_key: key.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn instance(server: &MockServer, id: Uuid) -> InstanceRef {
        InstanceRef {
            instance_id: id,
            base_url: server.uri(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn test_send_text_success() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path(format!("/message/sendText/{}", id)))
            .and(header("apikey", "k1"))
            .and(body_partial_json(serde_json::json!({
                "number": "+5511999887766",
                "text": "hello",
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"messageId": "WAMID.1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client("k1")
            .send_text(&instance(&server, id), "+5511999887766", "hello")
            .await
            .unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("WAMID.1"));
        assert_eq!(receipt.payload["messageId"], "WAMID.1");
    }

    #[tokio::test]
    async fn test_send_media_with_caption() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path(format!("/message/sendMedia/{}", id)))
            .and(body_partial_json(serde_json::json!({
                "number": "+14155552671",
                "media": "https://cdn.example.com/img.png",
                "caption": "look",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "M-42"})),
            )
            .mount(&server)
            .await;

        let receipt = client("k1")
            .send_media(
                &instance(&server, id),
                "+14155552671",
                "https://cdn.example.com/img.png",
                Some("look"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("M-42"));
    }

    #[tokio::test]
    async fn test_instance_api_key_overrides_default() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(header("apikey", "per-instance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut inst = instance(&server, id);
        inst.api_key = Some("per-instance".to_string());

        let receipt = client("default")
            .send_text(&inst, "+14155552671", "hi")
            .await
            .unwrap();
        assert!(receipt.message_id.is_none());
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"message": "rate limited"})),
            )
            .mount(&server)
            .await;

        let err = client("k1")
            .send_text(&instance(&server, id), "+14155552671", "hi")
            .await
            .unwrap_err();

        match err {
            GatewayError::Gateway { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_error_key_fallback_and_generic_status() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path(format!("/message/sendText/{}", id)))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": "invalid apikey"})),
            )
            .mount(&server)
            .await;

        let err = client("bad")
            .send_text(&instance(&server, id), "+14155552671", "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid apikey"));

        let server2 = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("bad gateway"))
            .mount(&server2)
            .await;

        let err = client("k1")
            .send_text(&instance(&server2, id), "+14155552671", "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }
}
