//! Stripe charges client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{CardError, CardProcessor, ChargeOutcome, ChargeRequest};
use crate::config::StripeConfig;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Charge provider client for Stripe's `/v1/charges`.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a client whose every request is bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, CardError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CardError::Request(e.to_string()))?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CardProcessor for StripeClient {
    #[instrument(skip(self, request), fields(amount_cents = request.amount_cents, currency = %request.currency))]
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, CardError> {
        let amount = request.amount_cents.to_string();
        let response = self
            .client
            .post(format!("{}/v1/charges", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", request.currency.as_str()),
                ("source", request.token.as_str()),
                ("description", request.description.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CardError::Timeout
                } else {
                    CardError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response
                .json()
                .await
                .map_err(|e| CardError::Response(e.to_string()))?;
            let message = body
                .error
                .message
                .unwrap_or_else(|| format!("charge rejected ({status})"));
            warn!(status = status.as_u16(), kind = ?body.error.kind, error = %message, "Charge rejected");
            return Err(match body.error.kind.as_deref() {
                Some("card_error" | "invalid_request_error") => CardError::Declined(message),
                _ => CardError::Request(message),
            });
        }

        let outcome: ChargeOutcome = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CardError::Timeout
            } else {
                CardError::Response(e.to_string())
            }
        })?;

        debug!(charge_id = %outcome.id, status = %outcome.status, "Charge response");
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_parsing() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#,
        )
        .unwrap();
        assert_eq!(body.error.kind.as_deref(), Some("card_error"));
        assert_eq!(body.error.message.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn test_charge_body_parsing() {
        let outcome: ChargeOutcome = serde_json::from_str(
            r#"{"id":"ch_3","object":"charge","status":"succeeded","failure_message":null,"amount":1083}"#,
        )
        .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.id, "ch_3");
    }
}
