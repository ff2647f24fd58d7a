//! Notification delivery.
//!
//! The engine never talks to email/SMS transports directly; everything
//! goes through the [`Notifier`] trait. A failing or timing-out notifier
//! is a recorded delivery failure, never a crash.

pub mod webhook;

use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::reminder::NotificationMethod;

pub use webhook::WebhookNotifier;

/// A single notification to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub method: NotificationMethod,

    /// Channel-specific recipient: email address, phone number, or client
    /// id for in-app delivery.
    pub recipient: String,

    pub template_id: String,

    pub payload: serde_json::Value,
}

/// Outcome of a successful hand-off to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// True when the transport confirmed receipt synchronously.
    pub delivered: bool,

    /// Transport-side reference for the message, if any.
    pub provider_ref: Option<String>,
}

/// External notifier collaborator.
///
/// Implementations are stateless between calls and safe to invoke from
/// the dispatcher's delivery workers.
pub trait Notifier: Send + Sync {
    /// Unique identifier (e.g. "webhook", "console").
    fn name(&self) -> &str;

    /// Attempt delivery of one notification.
    fn send(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Notifier that prints to stdout. Used for in-app delivery in the CLI
/// and as the fallback when no gateway is configured.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn send(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, DeliveryError> {
        println!(
            "[notify] {:?} -> {}: {} {}",
            request.method, request.recipient, request.template_id, request.payload
        );
        Ok(DeliveryReceipt {
            delivered: true,
            provider_ref: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn console_notifier_confirms_delivery() {
        let notifier = ConsoleNotifier;
        let receipt = notifier
            .send(&NotificationRequest {
                method: NotificationMethod::InApp,
                recipient: "client-1".to_string(),
                template_id: "weekly_checkin".to_string(),
                payload: json!({"contract_id": "c-1"}),
            })
            .unwrap();

        assert!(receipt.delivered);
    }
}
