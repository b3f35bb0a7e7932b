//! Application state shared across handlers.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::TokenSigner;
use crate::config::{OrdersConfig, StoreConfig};
use crate::db::{EntityStore, MemoryBackend, OrderBackend, PgBackend, create_pool};
use crate::notifications::{ChatSender, Dispatcher, EmailSender, EmailService, WhatsAppClient};
use crate::payments::{CardError, CardProcessor, StripeClient};

/// Error wiring up the service's dependencies.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("SMTP relay setup failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("charge client setup failed: {0}")]
    Card(#[from] CardError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Providers sit behind traits so tests can
/// substitute in-process fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: OrdersConfig,
    store: EntityStore,
    card: Arc<dyn CardProcessor>,
    dispatcher: Dispatcher,
    signer: TokenSigner,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .field("dispatcher", &self.inner.dispatcher)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble state from already-built providers.
    #[must_use]
    pub fn new(
        config: OrdersConfig,
        backend: Arc<dyn OrderBackend>,
        card: Arc<dyn CardProcessor>,
        email: Arc<dyn EmailSender>,
        chat: Option<Arc<dyn ChatSender>>,
    ) -> Self {
        let dispatcher = Dispatcher::new(email, chat, config.notifications.clone());
        let signer = TokenSigner::new(config.token_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                store: EntityStore::new(backend),
                card,
                dispatcher,
                signer,
                config,
            }),
        }
    }

    /// Build production providers from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or a provider client
    /// cannot be built.
    pub async fn from_config(config: OrdersConfig) -> Result<Self, StateError> {
        let backend: Arc<dyn OrderBackend> = match &config.store {
            StoreConfig::Postgres { database_url } => {
                let pool = create_pool(database_url).await?;
                tracing::info!("Connected to PostgreSQL");
                Arc::new(PgBackend::new(pool))
            }
            StoreConfig::Memory => {
                tracing::warn!("Using the in-memory store; records are lost on restart");
                Arc::new(MemoryBackend::new())
            }
        };

        let card: Arc<dyn CardProcessor> = Arc::new(StripeClient::new(&config.stripe)?);
        let email: Arc<dyn EmailSender> = Arc::new(EmailService::new(&config.email)?);
        let chat = config.whatsapp().map(|whatsapp| {
            tracing::info!("WhatsApp channel enabled");
            Arc::new(WhatsAppClient::new(whatsapp)) as Arc<dyn ChatSender>
        });

        Ok(Self::new(config, backend, card, email, chat))
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &OrdersConfig {
        &self.inner.config
    }

    /// Get a reference to the order and quote store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    /// Get a reference to the card processor.
    #[must_use]
    pub fn card(&self) -> &dyn CardProcessor {
        self.inner.card.as_ref()
    }

    /// Get a reference to the notification dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Get a reference to the bearer credential signer.
    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.inner.signer
    }
}
