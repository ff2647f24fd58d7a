//! Webhook notifier -- deliver notifications through an HTTP gateway.
//!
//! The gateway is expected to fan out to the real transports (email, SMS)
//! and may confirm synchronous delivery in its response body.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{DeliveryReceipt, NotificationRequest, Notifier};
use crate::error::DeliveryError;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Notifier posting JSON to a configured gateway URL.
pub struct WebhookNotifier {
    gateway_url: String,
}

#[derive(Deserialize, Default)]
struct GatewayResponse {
    #[serde(default)]
    delivered: bool,
    #[serde(default)]
    reference: Option<String>,
}

impl WebhookNotifier {
    /// Create a notifier for the given gateway URL.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn send(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, DeliveryError> {
        if self.gateway_url.is_empty() {
            return Err(DeliveryError::NotConfigured(
                "notification gateway URL is empty".to_string(),
            ));
        }

        let body = json!({
            "method": request.method,
            "recipient": request.recipient,
            "template_id": request.template_id,
            "payload": request.payload,
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let resp = client
            .post(&self.gateway_url)
            .json(&body)
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            let parsed: GatewayResponse = resp.json().unwrap_or_default();
            Ok(DeliveryReceipt {
                delivered: parsed.delivered,
                provider_ref: parsed.reference,
            })
        } else {
            let message = resp.text().unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
