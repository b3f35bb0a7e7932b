//! WhatsApp Cloud API client.
//!
//! Sends either a pre-approved template with positional body parameters or a
//! freeform text message to a single number.

use async_trait::async_trait;
use panaderia_core::{Language, Phone};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::WhatsAppConfig;

/// Errors that can occur when sending a chat message.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed.
    #[error("WhatsApp request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("WhatsApp response error: {0}")]
    Response(String),

    /// The API returned an error.
    #[error("WhatsApp API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Recipient number is not usable.
    #[error("Invalid phone number: {0}")]
    InvalidNumber(String),
}

impl WhatsAppError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Response(_) | Self::InvalidNumber(_) => false,
        }
    }
}

/// A chat message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatMessage {
    /// Pre-approved template with positional parameters.
    Template {
        name: String,
        language: Language,
        params: Vec<String>,
    },
    /// Freeform text.
    Text { body: String },
}

impl ChatMessage {
    fn to_request(&self, to: &Phone) -> Value {
        match self {
            Self::Template {
                name,
                language,
                params,
            } => {
                let parameters: Vec<Value> = params
                    .iter()
                    .map(|p| json!({ "type": "text", "text": p }))
                    .collect();
                json!({
                    "messaging_product": "whatsapp",
                    "to": to.as_str(),
                    "type": "template",
                    "template": {
                        "name": name,
                        "language": { "code": language.as_str() },
                        "components": [{ "type": "body", "parameters": parameters }],
                    },
                })
            }
            Self::Text { body } => json!({
                "messaging_product": "whatsapp",
                "to": to.as_str(),
                "type": "text",
                "text": { "preview_url": false, "body": body },
            }),
        }
    }
}

/// Outbound chat transport.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Send one message to one number.
    async fn send(&self, to: &Phone, message: &ChatMessage) -> Result<(), WhatsAppError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// WhatsApp Cloud API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: Client,
    access_token: SecretString,
    phone_number_id: String,
    api_base: String,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .finish_non_exhaustive()
    }
}

impl WhatsAppClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: Client::new(),
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatSender for WhatsAppClient {
    #[instrument(skip(self, message), fields(to = %to))]
    async fn send(&self, to: &Phone, message: &ChatMessage) -> Result<(), WhatsAppError> {
        let response = self
            .client
            .post(format!("{}/{}/messages", self.api_base, self.phone_number_id))
            .bearer_auth(self.access_token.expose_secret())
            .json(&message.to_request(to))
            .send()
            .await
            .map_err(|e| WhatsAppError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|d| d.message)
                .unwrap_or_else(|| status.to_string());
            error!(status = status.as_u16(), error = %message, "WhatsApp API error");
            return Err(WhatsAppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| WhatsAppError::Response(e.to_string()))?;

        debug!(
            message_id = ?sent.messages.first().map(|m| m.id.as_str()),
            "WhatsApp message accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_template_request_shape() {
        let message = ChatMessage::Template {
            name: "pago_listo".to_string(),
            language: Language::Es,
            params: vec!["Ana".to_string(), "$85.00".to_string()],
        };
        let body = message.to_request(&Phone::parse("512-555-0100").unwrap());
        assert_eq!(body["to"], "15125550100");
        assert_eq!(body["type"], "template");
        assert_eq!(body["template"]["language"]["code"], "es");
        assert_eq!(
            body["template"]["components"][0]["parameters"][1]["text"],
            "$85.00"
        );
    }

    #[test]
    fn test_text_request_shape() {
        let message = ChatMessage::Text {
            body: "Hola".to_string(),
        };
        let body = message.to_request(&Phone::parse("+52 55 1234 5678").unwrap());
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "Hola");
    }

    #[test]
    fn test_transient_classification() {
        assert!(WhatsAppError::Request("reset".to_string()).is_transient());
        assert!(
            WhatsAppError::Api {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !WhatsAppError::Api {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
    }
}
