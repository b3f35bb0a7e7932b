//! Notification fan-out.
//!
//! [`Dispatcher::dispatch`] resolves the recipients for an [`Event`], sends
//! each one its own rendered copy over email and, when a number and a chat
//! provider are available, WhatsApp. Every recipient is attempted regardless
//! of earlier failures, and the returned [`DispatchReport`] lists per-recipient
//! and per-channel outcomes.
//!
//! The dispatcher only performs outbound calls. It never touches the entity
//! store, so a failed notification cannot undo the transition it reports.

pub mod email;
pub mod messages;
pub mod whatsapp;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use panaderia_core::{Email, Language, Phone};
use serde::Serialize;
use tracing::{info, instrument, warn};

pub use email::{EmailError, EmailSender, EmailService};
pub use whatsapp::{ChatMessage, ChatSender, WhatsAppClient, WhatsAppError};

use crate::config::NotificationConfig;
use crate::db::{Order, Quote};
use crate::db::models::CustomerContact;

/// Transactional event that triggers a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// A paid order was recorded.
    OrderReceived,
    /// A customer asked for a quote.
    QuoteSubmitted,
    /// Staff priced or declined a quote.
    QuoteResponded,
    /// An order exists and can be paid.
    PaymentReady,
    /// The customer reported a manual transfer.
    PaymentSubmitted,
    /// Staff confirmed a manual transfer.
    PaymentConfirmed,
    /// The order can be collected.
    ReadyForPickup,
}

impl Event {
    pub const ALL: [Self; 7] = [
        Self::OrderReceived,
        Self::QuoteSubmitted,
        Self::QuoteResponded,
        Self::PaymentReady,
        Self::PaymentSubmitted,
        Self::PaymentConfirmed,
        Self::ReadyForPickup,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderReceived => "order_received",
            Self::QuoteSubmitted => "quote_submitted",
            Self::QuoteResponded => "quote_responded",
            Self::PaymentReady => "payment_ready",
            Self::PaymentSubmitted => "payment_submitted",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::ReadyForPickup => "ready_for_pickup",
        }
    }

    /// Who hears about this event.
    #[must_use]
    pub const fn audience(&self) -> Audience {
        match self {
            Self::OrderReceived | Self::QuoteSubmitted | Self::PaymentSubmitted => Audience::Both,
            Self::QuoteResponded
            | Self::PaymentReady
            | Self::PaymentConfirmed
            | Self::ReadyForPickup => Audience::Customer,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown event '{s}'"))
    }
}

/// Recipients of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Customer,
    Business,
    Both,
}

impl Audience {
    const fn includes(self, kind: RecipientKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _)
                | (Self::Customer, RecipientKind::Customer)
                | (Self::Business, RecipientKind::Business)
        )
    }
}

/// Kind of a single recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    Customer,
    Business,
}

/// Record an event is about.
#[derive(Debug, Clone, Copy)]
pub enum Notice<'a> {
    Order(&'a Order),
    Quote(&'a Quote),
}

impl Notice<'_> {
    const fn contact(&self) -> &CustomerContact {
        match self {
            Self::Order(order) => &order.customer,
            Self::Quote(quote) => &quote.customer,
        }
    }

    /// Customer name for greetings and template parameters.
    #[must_use]
    pub fn customer_name(&self) -> &str {
        &self.contact().name
    }
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Whatsapp,
}

/// Result of one channel for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub ok: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result for one recipient.
///
/// A recipient counts as delivered when at least one channel succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientOutcome {
    pub kind: RecipientKind,
    pub recipient: String,
    pub delivered: bool,
    pub channels: Vec<ChannelOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub event: Event,
    pub recipients: Vec<RecipientOutcome>,
}

impl DispatchReport {
    /// Number of recipients reached.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.recipients.iter().filter(|r| r.delivered).count()
    }

    /// Number of recipients not reached.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.recipients.len() - self.succeeded()
    }

    /// Recipients not reached, with the reasons.
    pub fn failures(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.recipients.iter().filter(|r| !r.delivered)
    }
}

/// One resolved recipient. Addresses are validated only when sending.
#[derive(Debug)]
struct Target {
    kind: RecipientKind,
    email: Option<String>,
    phone: Option<String>,
}

impl Target {
    fn label(&self) -> String {
        self.email
            .clone()
            .or_else(|| self.phone.clone())
            .unwrap_or_else(|| "customer".to_string())
    }
}

trait Retryable {
    fn retryable(&self) -> bool;
}

impl Retryable for EmailError {
    fn retryable(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for WhatsAppError {
    fn retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Notification fan-out dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    email: Arc<dyn EmailSender>,
    chat: Option<Arc<dyn ChatSender>>,
    config: NotificationConfig,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chat_enabled", &self.chat.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher. Without a chat sender only email is used.
    #[must_use]
    pub fn new(
        email: Arc<dyn EmailSender>,
        chat: Option<Arc<dyn ChatSender>>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            email,
            chat,
            config,
        }
    }

    /// Notify every recipient of `event` about `notice`.
    ///
    /// `language` selects the customer copy; business copies are Spanish.
    #[instrument(skip(self, notice), fields(event = %event))]
    pub async fn dispatch(
        &self,
        event: Event,
        notice: Notice<'_>,
        language: Language,
    ) -> DispatchReport {
        let mut recipients = Vec::new();
        for target in self.resolve(event.audience(), notice) {
            recipients.push(self.deliver(event, notice, language, &target).await);
        }

        let report = DispatchReport { event, recipients };
        for failure in report.failures() {
            warn!(
                recipient = %failure.recipient,
                kind = ?failure.kind,
                error = failure.error.as_deref().unwrap_or("all channels failed"),
                "Notification not delivered"
            );
        }
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Notification dispatch finished"
        );
        report
    }

    fn resolve(&self, audience: Audience, notice: Notice<'_>) -> Vec<Target> {
        let mut targets = Vec::new();

        if audience.includes(RecipientKind::Customer) {
            let contact = notice.contact();
            targets.push(Target {
                kind: RecipientKind::Customer,
                email: contact.email.as_ref().map(|e| e.as_str().to_string()),
                phone: contact.phone.as_ref().map(|p| p.as_str().to_string()),
            });
        }

        if audience.includes(RecipientKind::Business) {
            let mut seen = HashSet::new();
            let primary = self.config.business_email.trim();
            seen.insert(primary.to_lowercase());
            targets.push(Target {
                kind: RecipientKind::Business,
                email: Some(primary.to_string()),
                phone: self.config.business_phone.clone(),
            });
            for staff in &self.config.staff_emails {
                let staff = staff.trim();
                if !staff.is_empty() && seen.insert(staff.to_lowercase()) {
                    targets.push(Target {
                        kind: RecipientKind::Business,
                        email: Some(staff.to_string()),
                        phone: None,
                    });
                }
            }
        }

        targets
    }

    async fn deliver(
        &self,
        event: Event,
        notice: Notice<'_>,
        language: Language,
        target: &Target,
    ) -> RecipientOutcome {
        let recipient = target.label();
        let rendered = messages::render(event, target.kind, language, notice);
        let mut channels = Vec::new();

        if let Some(address) = &target.email {
            channels.push(match Email::parse(address) {
                Ok(to) => {
                    self.attempt(Channel::Email, || {
                        self.email.send(&to, &rendered.subject, &rendered.body)
                    })
                    .await
                }
                Err(e) => ChannelOutcome {
                    channel: Channel::Email,
                    ok: false,
                    attempts: 0,
                    error: Some(format!("invalid address '{address}': {e}")),
                },
            });
        }

        if let (Some(number), Some(chat)) = (&target.phone, &self.chat) {
            channels.push(match Phone::parse(number) {
                Ok(to) => {
                    let message = self.chat_message(event, target.kind, language, notice, &rendered);
                    self.attempt(Channel::Whatsapp, || chat.send(&to, &message))
                        .await
                }
                Err(e) => ChannelOutcome {
                    channel: Channel::Whatsapp,
                    ok: false,
                    attempts: 0,
                    error: Some(format!("invalid number '{number}': {e}")),
                },
            });
        }

        let error = if channels.is_empty() {
            Some(if target.email.is_none() && target.phone.is_none() {
                "no contact details on record".to_string()
            } else {
                "no channel available for this recipient".to_string()
            })
        } else {
            None
        };

        RecipientOutcome {
            kind: target.kind,
            recipient,
            delivered: channels.iter().any(|c| c.ok),
            channels,
            error,
        }
    }

    /// Template when one is configured for the pair, freeform text otherwise.
    fn chat_message(
        &self,
        event: Event,
        kind: RecipientKind,
        language: Language,
        notice: Notice<'_>,
        rendered: &messages::Rendered,
    ) -> ChatMessage {
        let language = match kind {
            RecipientKind::Customer => language,
            RecipientKind::Business => Language::Es,
        };
        self.config.templates.get(&(event, language)).map_or_else(
            || ChatMessage::Text {
                body: format!("{}\n\n{}", rendered.subject, rendered.body),
            },
            |name| ChatMessage::Template {
                name: name.clone(),
                language,
                params: messages::template_params(notice),
            },
        )
    }

    /// Run `send` up to the configured attempts with linear backoff.
    /// Permanent errors stop immediately.
    async fn attempt<F, Fut, E>(&self, channel: Channel, mut send: F) -> ChannelOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Retryable + fmt::Display,
    {
        let max_attempts = self.config.retry_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match send().await {
                Ok(()) => {
                    return ChannelOutcome {
                        channel,
                        ok: true,
                        attempts,
                        error: None,
                    };
                }
                Err(e) if e.retryable() && attempts < max_attempts => {
                    warn!(?channel, attempt = attempts, error = %e, "Notification send failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempts).await;
                }
                Err(e) => {
                    return ChannelOutcome {
                        channel,
                        ok: false,
                        attempts,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }
}
