//! Entity store with schema-drift tolerant writes.
//!
//! When a backend reports [`RepositoryError::MissingColumn`] for one of the
//! [`OptionalColumn`]s, the same operation is retried with that column
//! omitted, and any value the write carried for it is put back on the
//! returned record. Every other error, including a missing column that is not
//! optional, propagates unchanged.

use std::sync::Arc;

use panaderia_core::{OrderId, QuoteId};
use tracing::{instrument, warn};

use super::models::OptionalValues;
use super::{
    NewOrder, NewQuote, OptionalColumn, Order, OrderBackend, OrderPatch, Quote, QuotePatch,
    RepositoryError,
};

/// Owner of order and quote persistence.
#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn OrderBackend>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn OrderBackend>) -> Self {
        Self { backend }
    }

    /// Insert an order.
    ///
    /// # Errors
    ///
    /// Returns the backend error for anything other than a missing optional column.
    #[instrument(skip(self, order), fields(payment_type = %order.payment_type))]
    pub async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let values = order.optional_values();
        let mut omit = Vec::new();
        loop {
            match self.backend.insert_order(order, &omit).await {
                Ok(mut stored) => {
                    stored.reattach(&omit, &values);
                    return Ok(stored);
                }
                Err(err) => omit_or_fail(err, &mut omit, Some(&values))?,
            }
        }
    }

    /// Update an order and return the full updated record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist, or the backend error for
    /// anything other than a missing optional column.
    #[instrument(skip(self, patch), fields(order_id = %id))]
    pub async fn update_order(
        &self,
        id: OrderId,
        patch: &OrderPatch,
    ) -> Result<Order, RepositoryError> {
        let values = patch.optional_values();
        let mut omit = Vec::new();
        loop {
            match self.backend.update_order(id, patch, &omit).await {
                Ok(mut stored) => {
                    stored.reattach(&omit, &values);
                    return Ok(stored);
                }
                Err(err) => omit_or_fail(err, &mut omit, Some(&values))?,
            }
        }
    }

    /// Fetch an order.
    ///
    /// # Errors
    ///
    /// Returns the backend error for anything other than a missing optional column.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut omit = Vec::new();
        loop {
            match self.backend.get_order(id, &omit).await {
                Ok(order) => return Ok(order),
                Err(err) => omit_or_fail(err, &mut omit, None)?,
            }
        }
    }

    /// Insert a quote.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self, quote))]
    pub async fn insert_quote(&self, quote: &NewQuote) -> Result<Quote, RepositoryError> {
        self.backend.insert_quote(quote).await
    }

    /// Update a quote's status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the quote does not exist, or the backend error.
    #[instrument(skip(self, patch), fields(quote_id = %id, status = %patch.status))]
    pub async fn update_quote(
        &self,
        id: QuoteId,
        patch: &QuotePatch,
    ) -> Result<Quote, RepositoryError> {
        self.backend.update_quote(id, patch).await
    }

    /// Fetch a quote.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self), fields(quote_id = %id))]
    pub async fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        self.backend.get_quote(id).await
    }

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.backend.ping().await
    }
}

/// Record a missing optional column for the retry, or hand the error back.
fn omit_or_fail(
    err: RepositoryError,
    omit: &mut Vec<OptionalColumn>,
    values: Option<&OptionalValues>,
) -> Result<(), RepositoryError> {
    let RepositoryError::MissingColumn(name) = &err else {
        return Err(err);
    };
    match OptionalColumn::from_column_name(name) {
        Some(column) if !omit.contains(&column) => {
            let dropped_value = values.is_some_and(|v| v.carries(column));
            warn!(
                column = column.column_name(),
                dropped_value, "Column missing from schema, retrying without it"
            );
            omit.push(column);
            Ok(())
        }
        _ => Err(err),
    }
}
