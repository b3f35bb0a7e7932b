//! HTTP route handlers for the orders API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness
//! GET  /health/ready                  - Store reachability
//!
//! # Orders (bearer credential + allowed origin)
//! POST /api/create_or_update_order    - Persist a cart without paying
//! POST /api/confirm_card_payment      - Charge a card token
//! POST /api/confirm_manual_payment    - Declare a bank transfer
//! POST /api/confirm_payment           - Staff: transfer received
//! POST /api/update_order_status       - Staff: received -> ready -> delivered
//! GET  /api/orders/{id}               - Owner or staff
//!
//! # Quotes
//! POST /api/submit_quote              - Request a custom quote
//! POST /api/respond_to_quote          - Staff: price or reject
//! POST /api/finalize_quote            - Accept a priced quote as an order
//! GET  /api/quotes/{id}               - Owner or staff
//! ```
//!
//! Every response body is JSON with a `success` flag.

pub mod orders;
pub mod payments;
pub mod quotes;

use axum::{
    Router,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::db::Order;
use crate::state::AppState;

/// Create the `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/create_or_update_order", post(orders::create_or_update))
        .route("/update_order_status", post(orders::update_status))
        .route("/orders/{id}", get(orders::show))
        .route("/confirm_card_payment", post(payments::confirm_card))
        .route("/confirm_manual_payment", post(payments::confirm_manual))
        .route("/confirm_payment", post(payments::confirm))
        .route("/submit_quote", post(quotes::submit))
        .route("/respond_to_quote", post(quotes::respond))
        .route("/finalize_quote", post(quotes::finalize))
        .route("/quotes/{id}", get(quotes::show))
}

/// An order as returned to clients: the record plus its derived views.
fn order_view(order: &Order) -> Value {
    json!({
        "order": order,
        "payment_state": order.payment_state(),
        "metadata": order.metadata(),
    })
}

/// Merge `extra` into a `{"success": true}` envelope.
fn success(extra: Value) -> Value {
    let mut body = json!({ "success": true });
    if let (Value::Object(target), Value::Object(fields)) = (&mut body, extra) {
        target.extend(fields);
    }
    body
}
