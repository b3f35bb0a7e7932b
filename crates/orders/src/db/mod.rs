//! Order and quote persistence.
//!
//! # Tables
//!
//! - `quotes` - Customization quotes awaiting or carrying a staff estimate
//! - `orders` - Payable orders with line item snapshots and totals
//!
//! # Backends
//!
//! [`OrderBackend`] is implemented by [`PgBackend`] for production and by
//! [`MemoryBackend`] for tests and local development. Callers never talk to a
//! backend directly; they go through [`EntityStore`], which adds the
//! schema-drift retry.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/orders/migrations/` and applied
//! out-of-band:
//! ```bash
//! sqlx migrate run --source crates/orders/migrations
//! ```

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

use std::time::Duration;

use async_trait::async_trait;
use panaderia_core::{OrderId, QuoteId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryBackend;
pub use models::{NewOrder, NewQuote, OptionalColumn, Order, OrderPatch, Quote, QuotePatch};
pub use postgres::PgBackend;
pub use store::EntityStore;

/// Postgres `undefined_column` SQLSTATE.
const UNDEFINED_COLUMN: &str = "42703";
/// Postgres `unique_violation` SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The write referenced a column the deployed schema does not have.
    #[error("column does not exist: {0}")]
    MissingColumn(String),
}

impl RepositoryError {
    /// Classify a sqlx error, separating the missing-column signature from
    /// every other failure.
    #[must_use]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some(UNDEFINED_COLUMN) => {
                    if let Some(column) = quoted_column(db.message()) {
                        return Self::MissingColumn(column);
                    }
                }
                Some(UNIQUE_VIOLATION) => return Self::Conflict(db.message().to_string()),
                _ => {}
            }
        }
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Database(other),
        }
    }
}

/// Extract the column name from `column "x" of relation "y" does not exist`
/// or `column orders.x does not exist`.
fn quoted_column(message: &str) -> Option<String> {
    let rest = message.strip_prefix("column ")?;
    let name = if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next()?
    } else {
        rest.split_whitespace().next()?
    };
    let name = name.rsplit('.').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// Storage operations for orders and quotes.
///
/// `omit` lists optional columns the backend must neither write nor read;
/// omitted columns come back as `None` on the returned record.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Insert a new order; the backend assigns its id.
    async fn insert_order(
        &self,
        order: &NewOrder,
        omit: &[OptionalColumn],
    ) -> Result<Order, RepositoryError>;

    /// Apply a patch to an existing order and return the updated record.
    async fn update_order(
        &self,
        id: OrderId,
        patch: &OrderPatch,
        omit: &[OptionalColumn],
    ) -> Result<Order, RepositoryError>;

    /// Fetch an order by id.
    async fn get_order(
        &self,
        id: OrderId,
        omit: &[OptionalColumn],
    ) -> Result<Option<Order>, RepositoryError>;

    /// Insert a new quote; the backend assigns its id.
    async fn insert_quote(&self, quote: &NewQuote) -> Result<Quote, RepositoryError>;

    /// Apply a patch to an existing quote.
    async fn update_quote(&self, id: QuoteId, patch: &QuotePatch) -> Result<Quote, RepositoryError>;

    /// Fetch a quote by id.
    async fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_column_forms() {
        assert_eq!(
            quoted_column(r#"column "billing_postal_code" of relation "orders" does not exist"#),
            Some("billing_postal_code".to_string())
        );
        assert_eq!(
            quoted_column("column orders.language does not exist"),
            Some("language".to_string())
        );
        assert_eq!(quoted_column("relation \"orders\" does not exist"), None);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            RepositoryError::from_sqlx(sqlx::Error::RowNotFound),
            RepositoryError::NotFound
        ));
    }
}
