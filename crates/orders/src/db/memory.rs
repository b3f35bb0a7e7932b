//! In-process backend for tests and local development.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use panaderia_core::{OrderId, QuoteId, QuoteStatus};
use tokio::sync::RwLock;

use super::{
    NewOrder, NewQuote, OptionalColumn, Order, OrderBackend, OrderPatch, Quote, QuotePatch,
    RepositoryError,
};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    quotes: HashMap<QuoteId, Quote>,
    next_order_id: i32,
    next_quote_id: i32,
}

/// Backend keeping all records in memory.
///
/// [`MemoryBackend::with_missing_columns`] makes it behave like a database
/// whose schema lacks some optional columns: any order operation that does not
/// omit them fails with [`RepositoryError::MissingColumn`].
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
    missing: HashSet<OptionalColumn>,
}

impl MemoryBackend {
    /// Empty backend with the full schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a schema without `columns`.
    #[must_use]
    pub fn with_missing_columns(mut self, columns: &[OptionalColumn]) -> Self {
        self.missing.extend(columns.iter().copied());
        self
    }

    /// Number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    fn check_schema(&self, omit: &[OptionalColumn]) -> Result<Vec<OptionalColumn>, RepositoryError> {
        if let Some(column) = OptionalColumn::ALL
            .into_iter()
            .find(|c| self.missing.contains(c) && !omit.contains(c))
        {
            return Err(RepositoryError::MissingColumn(column.column_name().to_string()));
        }
        // Columns the schema lacks are never stored, omitted or not.
        let mut absent: Vec<OptionalColumn> = omit.to_vec();
        absent.extend(self.missing.iter().copied());
        Ok(absent)
    }
}

#[async_trait]
impl OrderBackend for MemoryBackend {
    async fn insert_order(
        &self,
        order: &NewOrder,
        omit: &[OptionalColumn],
    ) -> Result<Order, RepositoryError> {
        let absent = self.check_schema(omit)?;
        let mut tables = self.tables.write().await;
        tables.next_order_id += 1;
        let now = Utc::now();
        let mut stored = Order {
            id: OrderId::new(tables.next_order_id),
            owner_id: order.owner_id.clone(),
            customer: order.customer.clone(),
            billing_postal_code: order.billing_postal_code.clone(),
            language: order.language,
            items: order.items.clone(),
            subtotal: order.totals.subtotal(),
            tax: order.totals.tax(),
            total: order.totals.total(),
            pickup_date: order.pickup_date,
            pickup_time: order.pickup_time.clone(),
            special_requests: order.special_requests.clone(),
            status: order.status,
            payment_type: order.payment_type,
            payment_status: order.payment_status,
            payment_reference: order.payment_reference.clone(),
            created_at: now,
            updated_at: now,
        };
        stored.clear_omitted(&absent);
        tables.orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_order(
        &self,
        id: OrderId,
        patch: &OrderPatch,
        omit: &[OptionalColumn],
    ) -> Result<Order, RepositoryError> {
        let absent = self.check_schema(omit)?;
        let mut tables = self.tables.write().await;
        let order = tables.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        patch.apply_to(order, &absent);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn get_order(
        &self,
        id: OrderId,
        omit: &[OptionalColumn],
    ) -> Result<Option<Order>, RepositoryError> {
        self.check_schema(omit)?;
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn insert_quote(&self, quote: &NewQuote) -> Result<Quote, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.next_quote_id += 1;
        let stored = Quote {
            id: QuoteId::new(tables.next_quote_id),
            owner_id: quote.owner_id.clone(),
            customer: quote.customer.clone(),
            language: quote.language,
            occasion: quote.occasion.clone(),
            theme: quote.theme.clone(),
            budget: quote.budget.clone(),
            servings: quote.servings,
            description: quote.description.clone(),
            photo_url: quote.photo_url.clone(),
            pickup_date: quote.pickup_date,
            pickup_time: quote.pickup_time.clone(),
            status: QuoteStatus::Pending,
            estimated_price: None,
            admin_notes: None,
            created_at: Utc::now(),
            responded_at: None,
        };
        tables.quotes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_quote(&self, id: QuoteId, patch: &QuotePatch) -> Result<Quote, RepositoryError> {
        let mut tables = self.tables.write().await;
        let quote = tables.quotes.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !patch.allows(quote.status) {
            return Err(RepositoryError::Conflict(format!(
                "quote {id} is {}",
                quote.status
            )));
        }
        patch.apply_to(quote);
        Ok(quote.clone())
    }

    async fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.tables.read().await.quotes.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use panaderia_core::{Language, Phone};

    use super::*;
    use crate::db::models::CustomerContact;

    fn new_quote() -> NewQuote {
        NewQuote {
            owner_id: Some("cust-9".to_string()),
            customer: CustomerContact {
                name: "Luis".to_string(),
                email: None,
                phone: Some(Phone::parse("512-555-0100").unwrap()),
            },
            language: Language::Es,
            occasion: Some("birthday".to_string()),
            theme: None,
            budget: None,
            servings: Some(20),
            description: None,
            photo_url: None,
            pickup_date: None,
            pickup_time: None,
        }
    }

    #[tokio::test]
    async fn test_ids_are_assigned_by_the_store() {
        let backend = MemoryBackend::new();
        let first = backend.insert_quote(&new_quote()).await.unwrap();
        let second = backend.insert_quote(&new_quote()).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.status, QuoteStatus::Pending);
        assert_eq!(first.estimated_price, None);
    }

    #[tokio::test]
    async fn test_update_missing_records() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_order(OrderId::new(42), &OrderPatch::default(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let err = backend
            .update_quote(QuoteId::new(42), &QuotePatch::accept(rust_decimal::Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_missing_column_reported_until_omitted() {
        let backend =
            MemoryBackend::new().with_missing_columns(&[OptionalColumn::BillingPostalCode]);
        let err = backend.get_order(OrderId::new(1), &[]).await.unwrap_err();
        assert!(matches!(err, RepositoryError::MissingColumn(c) if c == "billing_postal_code"));
        assert!(
            backend
                .get_order(OrderId::new(1), &[OptionalColumn::BillingPostalCode])
                .await
                .unwrap()
                .is_none()
        );
    }
}
