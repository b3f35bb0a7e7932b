//! `PostgreSQL` backend.
//!
//! Queries are assembled at runtime with [`QueryBuilder`] because the column
//! list depends on which optional columns the deployed schema has. Omitted
//! columns are selected as typed `NULL`s so the row shape never changes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use panaderia_core::{
    CartLineItem, Email, Language, OrderId, OrderStatus, PaymentStatus, PaymentType, Phone,
    QuoteId, QuoteStatus,
};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use super::models::CustomerContact;
use super::{
    NewOrder, NewQuote, OptionalColumn, Order, OrderBackend, OrderPatch, Quote, QuotePatch,
    RepositoryError,
};

const ORDER_BASE_COLUMNS: &str = "id, owner_id, customer_name, customer_email, customer_phone, \
     items, subtotal, tax, total, pickup_date, pickup_time, special_requests, status, \
     payment_type, payment_status, payment_reference, created_at, updated_at";

const QUOTE_COLUMNS: &str = "id, owner_id, customer_name, customer_email, customer_phone, \
     language, occasion, theme, budget, servings, description, photo_url, pickup_date, \
     pickup_time, status, estimated_price, admin_notes, created_at, responded_at";

/// Backend over a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Order column list for a `SELECT`/`RETURNING`, with omitted columns as NULLs.
fn order_columns(omit: &[OptionalColumn]) -> String {
    let mut columns = ORDER_BASE_COLUMNS.to_string();
    for column in OptionalColumn::ALL {
        let name = column.column_name();
        if omit.contains(&column) {
            columns.push_str(&format!(", NULL::text AS {name}"));
        } else {
            columns.push_str(&format!(", {name}"));
        }
    }
    columns
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    owner_id: Option<String>,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    items: Json<Vec<CartLineItem>>,
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
    pickup_date: Option<NaiveDate>,
    pickup_time: Option<String>,
    special_requests: Option<String>,
    status: String,
    payment_type: String,
    payment_status: String,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    billing_postal_code: Option<String>,
    language: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            customer: contact(row.customer_name, row.customer_email, row.customer_phone)?,
            billing_postal_code: row.billing_postal_code,
            language: row
                .language
                .as_deref()
                .map(parse_text::<Language>)
                .transpose()?
                .unwrap_or_default(),
            items: row.items.0,
            subtotal: row.subtotal,
            tax: row.tax,
            total: row.total,
            pickup_date: row.pickup_date,
            pickup_time: row.pickup_time,
            special_requests: row.special_requests,
            status: parse_text::<OrderStatus>(&row.status)?,
            payment_type: parse_text::<PaymentType>(&row.payment_type)?,
            payment_status: parse_text::<PaymentStatus>(&row.payment_status)?,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: QuoteId,
    owner_id: Option<String>,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    language: String,
    occasion: Option<String>,
    theme: Option<String>,
    budget: Option<String>,
    servings: Option<i32>,
    description: Option<String>,
    photo_url: Option<String>,
    pickup_date: Option<NaiveDate>,
    pickup_time: Option<String>,
    status: String,
    estimated_price: Option<Decimal>,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = RepositoryError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        let servings = row
            .servings
            .map(|s| {
                u32::try_from(s)
                    .map_err(|_| RepositoryError::DataCorruption(format!("servings {s}")))
            })
            .transpose()?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            customer: contact(row.customer_name, row.customer_email, row.customer_phone)?,
            language: parse_text::<Language>(&row.language)?,
            occasion: row.occasion,
            theme: row.theme,
            budget: row.budget,
            servings,
            description: row.description,
            photo_url: row.photo_url,
            pickup_date: row.pickup_date,
            pickup_time: row.pickup_time,
            status: parse_text::<QuoteStatus>(&row.status)?,
            estimated_price: row.estimated_price,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            responded_at: row.responded_at,
        })
    }
}

fn parse_text<T>(value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(RepositoryError::DataCorruption)
}

fn contact(
    name: String,
    email: Option<String>,
    phone: Option<String>,
) -> Result<CustomerContact, RepositoryError> {
    let email = email
        .map(|e| Email::parse(&e).map_err(|err| RepositoryError::DataCorruption(err.to_string())))
        .transpose()?;
    let phone = phone
        .map(|p| Phone::parse(&p).map_err(|err| RepositoryError::DataCorruption(err.to_string())))
        .transpose()?;
    Ok(CustomerContact { name, email, phone })
}

fn email_text(contact: &CustomerContact) -> Option<String> {
    contact.email.as_ref().map(|e| e.as_str().to_string())
}

fn phone_text(contact: &CustomerContact) -> Option<String> {
    contact.phone.as_ref().map(|p| p.as_str().to_string())
}

#[async_trait]
impl OrderBackend for PgBackend {
    #[instrument(skip(self, order))]
    async fn insert_order(
        &self,
        order: &NewOrder,
        omit: &[OptionalColumn],
    ) -> Result<Order, RepositoryError> {
        let write_billing = !omit.contains(&OptionalColumn::BillingPostalCode);
        let write_language = !omit.contains(&OptionalColumn::Language);

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO orders (owner_id, customer_name, customer_email, customer_phone, \
             items, subtotal, tax, total, pickup_date, pickup_time, special_requests, status, \
             payment_type, payment_status, payment_reference",
        );
        if write_billing {
            qb.push(", billing_postal_code");
        }
        if write_language {
            qb.push(", language");
        }

        qb.push(") VALUES (");
        let mut values = qb.separated(", ");
        values.push_bind(order.owner_id.clone());
        values.push_bind(order.customer.name.clone());
        values.push_bind(email_text(&order.customer));
        values.push_bind(phone_text(&order.customer));
        values.push_bind(Json(order.items.clone()));
        values.push_bind(order.totals.subtotal());
        values.push_bind(order.totals.tax());
        values.push_bind(order.totals.total());
        values.push_bind(order.pickup_date);
        values.push_bind(order.pickup_time.clone());
        values.push_bind(order.special_requests.clone());
        values.push_bind(order.status.as_str());
        values.push_bind(order.payment_type.as_str());
        values.push_bind(order.payment_status.as_str());
        values.push_bind(order.payment_reference.clone());
        if write_billing {
            values.push_bind(order.billing_postal_code.clone());
        }
        if write_language {
            values.push_bind(order.language.as_str());
        }
        qb.push(") RETURNING ");
        qb.push(order_columns(omit));

        let row = qb
            .build_query_as::<OrderRow>()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;
        row.try_into()
    }

    #[instrument(skip(self, patch))]
    async fn update_order(
        &self,
        id: OrderId,
        patch: &OrderPatch,
        omit: &[OptionalColumn],
    ) -> Result<Order, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = now()");

        if let Some(customer) = &patch.customer {
            qb.push(", customer_name = ").push_bind(customer.name.clone());
            qb.push(", customer_email = ").push_bind(email_text(customer));
            qb.push(", customer_phone = ").push_bind(phone_text(customer));
        }
        if !omit.contains(&OptionalColumn::BillingPostalCode)
            && let Some(code) = &patch.billing_postal_code
        {
            qb.push(", billing_postal_code = ").push_bind(code.clone());
        }
        if !omit.contains(&OptionalColumn::Language)
            && let Some(language) = patch.language
        {
            qb.push(", language = ").push_bind(language.as_str());
        }
        if let Some(items) = &patch.items {
            qb.push(", items = ").push_bind(Json(items.clone()));
        }
        if let Some(amounts) = patch.amounts {
            qb.push(", subtotal = ").push_bind(amounts.subtotal());
            qb.push(", tax = ").push_bind(amounts.tax());
            qb.push(", total = ").push_bind(amounts.total());
        }
        if let Some(date) = patch.pickup_date {
            qb.push(", pickup_date = ").push_bind(date);
        }
        if let Some(time) = &patch.pickup_time {
            qb.push(", pickup_time = ").push_bind(time.clone());
        }
        if let Some(text) = &patch.special_requests {
            qb.push(", special_requests = ").push_bind(text.clone());
        }
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(payment_type) = patch.payment_type {
            qb.push(", payment_type = ").push_bind(payment_type.as_str());
        }
        if let Some(payment_status) = patch.payment_status {
            qb.push(", payment_status = ").push_bind(payment_status.as_str());
        }
        if let Some(reference) = &patch.payment_reference {
            qb.push(", payment_reference = ").push_bind(reference.clone());
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ");
        qb.push(order_columns(omit));

        let row = qb
            .build_query_as::<OrderRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get_order(
        &self,
        id: OrderId,
        omit: &[OptionalColumn],
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", order_columns(omit));
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .map(Order::try_from)
            .transpose()
    }

    #[instrument(skip(self, quote))]
    async fn insert_quote(&self, quote: &NewQuote) -> Result<Quote, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO quotes (owner_id, customer_name, customer_email, customer_phone, \
             language, occasion, theme, budget, servings, description, photo_url, pickup_date, \
             pickup_time, status) VALUES (",
        );
        let servings = quote
            .servings
            .map(|s| {
                i32::try_from(s).map_err(|_| {
                    RepositoryError::DataCorruption(format!("servings {s} exceeds the column range"))
                })
            })
            .transpose()?;

        let mut values = qb.separated(", ");
        values.push_bind(quote.owner_id.clone());
        values.push_bind(quote.customer.name.clone());
        values.push_bind(email_text(&quote.customer));
        values.push_bind(phone_text(&quote.customer));
        values.push_bind(quote.language.as_str());
        values.push_bind(quote.occasion.clone());
        values.push_bind(quote.theme.clone());
        values.push_bind(quote.budget.clone());
        values.push_bind(servings);
        values.push_bind(quote.description.clone());
        values.push_bind(quote.photo_url.clone());
        values.push_bind(quote.pickup_date);
        values.push_bind(quote.pickup_time.clone());
        values.push_bind(QuoteStatus::Pending.as_str());
        qb.push(") RETURNING ");
        qb.push(QUOTE_COLUMNS);

        let row = qb
            .build_query_as::<QuoteRow>()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;
        row.try_into()
    }

    #[instrument(skip(self, patch))]
    async fn update_quote(&self, id: QuoteId, patch: &QuotePatch) -> Result<Quote, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE quotes SET status = ");
        qb.push_bind(patch.status.as_str());
        qb.push(", estimated_price = ").push_bind(patch.estimated_price);
        if let Some(notes) = &patch.admin_notes {
            qb.push(", admin_notes = ").push_bind(notes.clone());
        }
        if let Some(at) = patch.responded_at {
            qb.push(", responded_at = ").push_bind(at);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status IN (");
        let mut statuses = qb.separated(", ");
        for status in patch.from {
            statuses.push_bind(status.as_str());
        }
        statuses.push_unseparated(")");
        qb.push(" RETURNING ");
        qb.push(QUOTE_COLUMNS);

        let row = qb
            .build_query_as::<QuoteRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;

        match row {
            Some(row) => row.try_into(),
            // Either gone or no longer in a status the patch may leave.
            None => match self.get_quote(id).await? {
                Some(current) => Err(RepositoryError::Conflict(format!(
                    "quote {id} is {}",
                    current.status
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }

    #[instrument(skip(self))]
    async fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1");
        sqlx::query_as::<_, QuoteRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .map(Quote::try_from)
            .transpose()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_columns_select_nulls_for_omitted() {
        let all = order_columns(&[]);
        assert!(all.ends_with(", billing_postal_code, language"));

        let drifted = order_columns(&[OptionalColumn::BillingPostalCode]);
        assert!(drifted.contains("NULL::text AS billing_postal_code"));
        assert!(drifted.ends_with(", language"));
    }
}
