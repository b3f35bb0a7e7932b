//! Black-box API tests for the Panaderia orders service.
//!
//! [`TestContext`] builds the real router over the in-memory store and
//! recording fakes for the card, email and chat providers, then drives it with
//! `tower::ServiceExt::oneshot`. No network or database is needed.
//!
//! ```bash
//! cargo test -p panaderia-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use panaderia_core::{Email, Phone, Role};
use panaderia_orders::{
    app,
    config::OrdersConfig,
    db::MemoryBackend,
    middleware::OriginPolicy,
    notifications::{ChatMessage, ChatSender, EmailError, EmailSender, WhatsAppError},
    payments::{CardError, CardProcessor, ChargeOutcome, ChargeRequest, SUCCEEDED},
    state::AppState,
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Origin every test request declares unless it says otherwise.
pub const ORIGIN: &str = "https://panaderia.shop";

const TOKEN_SECRET: &str = "Zq7vR2mK9pL4xW8nB3tY6hJ1cF5gD0sA";

/// Card processor that approves charges unless told to decline or time out.
///
/// Like the real provider, a replayed idempotency key returns the original
/// charge instead of charging again.
#[derive(Default)]
pub struct FakeCardProcessor {
    charges: Mutex<Vec<ChargeRequest>>,
    by_key: Mutex<HashMap<String, String>>,
    decline: Mutex<Option<String>>,
    lose_next_response: Mutex<bool>,
}

impl FakeCardProcessor {
    /// Decline every following charge with `message`.
    pub fn decline_with(&self, message: &str) {
        *self.decline.lock().unwrap() = Some(message.to_string());
    }

    /// Take the next charge but time out before answering, as when the
    /// provider's response is lost on the way back.
    pub fn time_out_next(&self) {
        *self.lose_next_response.lock().unwrap() = true;
    }

    /// Charges the provider actually received.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl CardProcessor for FakeCardProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, CardError> {
        if let Some(message) = self.decline.lock().unwrap().clone() {
            return Err(CardError::Declined(message));
        }

        let mut by_key = self.by_key.lock().unwrap();
        let id = match by_key.get(&request.idempotency_key) {
            Some(id) => id.clone(),
            None => {
                self.charges.lock().unwrap().push(request.clone());
                let id = format!("ch_test_{}", by_key.len() + 1);
                by_key.insert(request.idempotency_key.clone(), id.clone());
                id
            }
        };
        drop(by_key);

        if std::mem::take(&mut *self.lose_next_response.lock().unwrap()) {
            return Err(CardError::Timeout);
        }

        Ok(ChargeOutcome {
            id,
            status: SUCCEEDED.to_string(),
            failure_message: None,
        })
    }
}

/// One delivered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email sender that records deliveries and bounces listed addresses.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    bounce: Mutex<Vec<String>>,
}

impl RecordingEmailSender {
    /// Reject mail to `address` permanently.
    pub fn bounce(&self, address: &str) {
        self.bounce.lock().unwrap().push(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Addresses that received mail, in delivery order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &Email, subject: &str, body: &str) -> Result<(), EmailError> {
        if self.bounce.lock().unwrap().iter().any(|b| b == to.as_str()) {
            return Err(EmailError::Rejected("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.as_str().to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Chat sender that records every message.
#[derive(Default)]
pub struct RecordingChatSender {
    sent: Mutex<Vec<(String, ChatMessage)>>,
}

impl RecordingChatSender {
    pub fn sent(&self) -> Vec<(String, ChatMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSender for RecordingChatSender {
    async fn send(&self, to: &Phone, message: &ChatMessage) -> Result<(), WhatsAppError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.as_str().to_string(), message.clone()));
        Ok(())
    }
}

/// Settings a test may adjust before the router is built.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Extra staff addresses for business notifications.
    pub staff_emails: Vec<String>,
    pub business_phone: Option<String>,
}

/// The router plus handles on every fake behind it.
pub struct TestContext {
    pub router: Router,
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
    pub card: Arc<FakeCardProcessor>,
    pub email: Arc<RecordingEmailSender>,
    pub chat: Arc<RecordingChatSender>,
}

impl TestContext {
    /// Context over an empty store with the full schema.
    pub fn new() -> Self {
        Self::build(MemoryBackend::new(), ContextOptions::default())
    }

    /// Context over a caller-prepared store, e.g. one missing columns.
    pub fn with_backend(backend: MemoryBackend) -> Self {
        Self::build(backend, ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        Self::build(MemoryBackend::new(), options)
    }

    fn build(backend: MemoryBackend, options: ContextOptions) -> Self {
        let origins = OriginPolicy::from_origins(&[ORIGIN.to_string()], false).unwrap();
        let mut config = OrdersConfig::in_memory(SecretString::from(TOKEN_SECRET.to_string()), origins);
        config.notifications.staff_emails = options.staff_emails;
        config.notifications.business_phone = options.business_phone;

        let backend = Arc::new(backend);
        let card = Arc::new(FakeCardProcessor::default());
        let email = Arc::new(RecordingEmailSender::default());
        let chat = Arc::new(RecordingChatSender::default());

        let state = AppState::new(
            config,
            backend.clone(),
            card.clone(),
            email.clone(),
            Some(chat.clone()),
        );

        Self {
            router: app(state.clone()),
            state,
            backend,
            card,
            email,
            chat,
        }
    }

    /// Bearer credential for `subject` valid for an hour.
    pub fn token(&self, subject: &str, role: Role) -> String {
        self.state
            .signer()
            .mint(subject, role, None, None, chrono::Duration::hours(1))
            .unwrap()
    }

    pub fn customer_token(&self, subject: &str) -> String {
        self.token(subject, Role::Customer)
    }

    pub fn staff_token(&self) -> String {
        self.token("emp-1", Role::Employee)
    }

    /// `POST /api/{action}` from the allowed origin.
    pub async fn post(&self, action: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
        let request = request(Method::POST, &format!("/api/{action}"), token, Some(ORIGIN))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// `GET {path}` from the allowed origin.
    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = request(Method::GET, path, token, Some(ORIGIN))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a hand-built request and decode its JSON body (`Null` if none).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Request builder with optional bearer credential and origin.
pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    origin: Option<&str>,
) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder
}
