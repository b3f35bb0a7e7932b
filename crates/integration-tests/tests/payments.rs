//! Payment reconciliation through the HTTP API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::str::FromStr;

use axum::http::StatusCode;
use panaderia_integration_tests::TestContext;
use rust_decimal::Decimal;
use serde_json::{Value, json};

fn money(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

fn tres_leches() -> Value {
    json!({
        "customer": { "name": "Ana Pérez", "email": "ana@example.com" },
        "items": [{ "name": "Tres Leches", "unit_price": "5.00", "quantity": 2 }],
        "pickup_date": "2026-11-14",
        "pickup_time": "15:00"
    })
}

#[tokio::test]
async fn manual_transfer_waits_for_staff_confirmation() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    let (status, body) = ctx
        .post(
            "confirm_manual_payment",
            Some(&customer),
            &json!({ "order": tres_leches() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let order = &body["order"];
    assert_eq!(money(&order["subtotal"]), Decimal::new(1000, 2));
    assert_eq!(money(&order["tax"]), Decimal::ZERO);
    assert_eq!(money(&order["total"]), Decimal::new(1000, 2));
    assert_eq!(order["payment_type"], "zelle");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(body["payment_state"], "payment_submitted");
    assert!(order["payment_reference"].as_str().unwrap().starts_with("ZL-"));
    assert!(ctx.card.charges().is_empty());

    // The customer cannot confirm their own transfer.
    let id = order["id"].clone();
    let (status, _) = ctx
        .post("confirm_payment", Some(&customer), &json!({ "order_id": id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .post(
            "confirm_payment",
            Some(&ctx.staff_token()),
            &json!({ "order_id": id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["payment_status"], "completed");
    assert_eq!(body["payment_state"], "payment_confirmed");

    // Only a pending payment can be confirmed.
    let (status, _) = ctx
        .post(
            "confirm_payment",
            Some(&ctx.staff_token()),
            &json!({ "order_id": id }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn card_payment_charges_the_recomputed_total() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order": tres_leches(), "token": "tok_visa", "billing_postal_code": "78701" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let order = &body["order"];
    assert_eq!(money(&order["tax"]), Decimal::new(83, 2));
    assert_eq!(money(&order["total"]), Decimal::new(1083, 2));
    assert_eq!(order["payment_type"], "card");
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["billing_postal_code"], "78701");
    assert_eq!(body["payment_state"], "payment_confirmed");

    let charges = ctx.card.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount_cents, 1083);
    assert_eq!(charges[0].currency, "usd");
    assert_eq!(order["payment_reference"], "ch_test_1");
}

#[tokio::test]
async fn saved_cart_is_paid_in_place() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    let mut cart = tres_leches();
    cart["payment_method"] = json!("card");
    let (status, body) = ctx
        .post("create_or_update_order", Some(&customer), &cart)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment_state"], "awaiting_payment");
    let id = body["order"]["id"].clone();

    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order_id": id, "token": "tok_visa" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["id"], id);
    assert_eq!(ctx.backend.order_count().await, 1);
}

#[tokio::test]
async fn replayed_card_confirmation_never_creates_a_second_paid_order() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    let (_, first) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order": tres_leches(), "token": "tok_once" }),
        )
        .await;
    let id = first["order"]["id"].clone();

    let (status, second) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order_id": id, "token": "tok_once" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_eq!(second["already_confirmed"], true);
    assert_eq!(second["order"]["id"], id);
    assert_eq!(second["order"]["payment_reference"], first["order"]["payment_reference"]);

    assert_eq!(ctx.card.charges().len(), 1);
    assert_eq!(ctx.backend.order_count().await, 1);
}

#[tokio::test]
async fn declined_card_leaves_the_order_payable() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    let (_, saved) = ctx
        .post("create_or_update_order", Some(&customer), &tres_leches())
        .await;
    let id = saved["order"]["id"].clone();

    ctx.card.decline_with("Your card was declined.");
    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order_id": id, "token": "tok_chargeDeclined" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["order_id"], id);
    assert!(body["error"].as_str().unwrap().contains("declined"));

    let (_, after) = ctx
        .get(&format!("/api/orders/{id}"), Some(&customer))
        .await;
    assert_eq!(after["order"], saved["order"]);
    assert_eq!(after["payment_state"], "awaiting_payment");
    assert!(ctx.email.sent().is_empty());
}

#[tokio::test]
async fn customer_cannot_pay_someone_elses_order() {
    let ctx = TestContext::new();

    let (_, saved) = ctx
        .post(
            "create_or_update_order",
            Some(&ctx.customer_token("cust-1")),
            &tres_leches(),
        )
        .await;
    let id = saved["order"]["id"].clone();

    let intruder = ctx.customer_token("cust-2");
    let (status, body) = ctx
        .post(
            "confirm_manual_payment",
            Some(&intruder),
            &json!({ "order_id": id, "reference": "ZL-STOLEN" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = ctx
        .post(
            "confirm_card_payment",
            Some(&intruder),
            &json!({ "order_id": id, "token": "tok_visa" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(ctx.card.charges().is_empty());

    let (_, after) = ctx
        .get(&format!("/api/orders/{id}"), Some(&ctx.staff_token()))
        .await;
    assert_eq!(after["order"], saved["order"]);
}

#[tokio::test]
async fn price_pending_items_cannot_be_paid() {
    let ctx = TestContext::new();
    let cart = json!({
        "customer": { "name": "Ana", "phone": "5125550100" },
        "items": [{ "name": "Pastel de boda", "quantity": 1, "pending_price": true }]
    });

    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&ctx.customer_token("cust-1")),
            &json!({ "order": cart, "token": "tok_visa" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(ctx.card.charges().is_empty());
    assert_eq!(ctx.backend.order_count().await, 0);
}

#[tokio::test]
async fn order_id_and_cart_together_are_rejected() {
    let ctx = TestContext::new();
    let (status, _) = ctx
        .post(
            "confirm_manual_payment",
            Some(&ctx.customer_token("cust-1")),
            &json!({ "order_id": 1, "order": tres_leches() }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.backend.order_count().await, 0);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let ctx = TestContext::new();
    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&ctx.customer_token("cust-1")),
            &json!({ "order_id": "not-a-number" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn card_orders_are_not_confirmed_by_hand() {
    let ctx = TestContext::new();

    let (_, saved) = ctx
        .post(
            "create_or_update_order",
            Some(&ctx.customer_token("cust-1")),
            &tres_leches(),
        )
        .await;
    assert_eq!(saved["order"]["payment_type"], "card");
    let id = saved["order"]["id"].clone();

    let (status, body) = ctx
        .post(
            "confirm_payment",
            Some(&ctx.staff_token()),
            &json!({ "order_id": id }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (_, after) = ctx
        .get(&format!("/api/orders/{id}"), Some(&ctx.staff_token()))
        .await;
    assert_eq!(after["order"]["payment_status"], "pending");
}

#[tokio::test]
async fn timed_out_charge_can_be_retried_with_the_same_token() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    let (_, saved) = ctx
        .post("create_or_update_order", Some(&customer), &tres_leches())
        .await;
    let id = saved["order"]["id"].clone();

    ctx.card.time_out_next();
    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order_id": id, "token": "tok_slow" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["order_id"], id);

    let (_, after) = ctx
        .get(&format!("/api/orders/{id}"), Some(&customer))
        .await;
    assert_eq!(after["payment_state"], "awaiting_payment");
    assert!(after["order"]["payment_reference"].is_null());

    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&customer),
            &json!({ "order_id": id, "token": "tok_slow" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment_state"], "payment_confirmed");
    assert_eq!(body["order"]["payment_reference"], "ch_test_1");
    assert_eq!(ctx.card.charges().len(), 1);
}

#[tokio::test]
async fn absurd_amounts_are_a_bad_request() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");

    for item in [
        json!({ "name": "Pastel", "unit_price": "79228162514264337593543950335", "quantity": 2 }),
        json!({ "name": "Concha", "unit_price": "1.50", "quantity": 4_000_000_000_u32 }),
    ] {
        let cart = json!({
            "customer": { "name": "Ana", "email": "ana@example.com" },
            "items": [item]
        });
        let (status, body) = ctx
            .post("create_or_update_order", Some(&customer), &cart)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["success"], false);
    }
    assert_eq!(ctx.backend.order_count().await, 0);
}
