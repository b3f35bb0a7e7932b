//! Notification fan-out as seen from API responses.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use panaderia_integration_tests::{ContextOptions, TestContext};
use panaderia_orders::notifications::ChatMessage;
use serde_json::json;

fn cart() -> serde_json::Value {
    json!({
        "customer": { "name": "Ana", "email": "ana@example.com" },
        "items": [{ "name": "Conchas", "unit_price": "1.50", "quantity": 6 }]
    })
}

#[tokio::test]
async fn one_bad_staff_address_fails_only_its_own_delivery() {
    let ctx = TestContext::with_options(ContextOptions {
        staff_emails: vec!["rosa@panaderia.shop".to_string(), "rosa.panaderia".to_string()],
        business_phone: None,
    });

    let (status, body) = ctx
        .post(
            "confirm_card_payment",
            Some(&ctx.customer_token("cust-1")),
            &json!({ "order": cart(), "token": "tok_visa" }),
        )
        .await;

    // The payment stands even though a notification failed.
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment_state"], "payment_confirmed");

    let report = &body["notifications"];
    assert_eq!(report["event"], "order_received");
    let recipients = report["recipients"].as_array().unwrap();
    assert_eq!(recipients.len(), 4);
    let delivered = recipients.iter().filter(|r| r["delivered"] == true).count();
    assert_eq!(delivered, 3);

    let failed: Vec<_> = recipients.iter().filter(|r| r["delivered"] == false).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["recipient"], "rosa.panaderia");

    let mut sent = ctx.email.recipients();
    sent.sort();
    assert_eq!(
        sent,
        vec!["ana@example.com", "pedidos@panaderia.shop", "rosa@panaderia.shop"]
    );
}

#[tokio::test]
async fn bounced_customer_mail_does_not_undo_the_order() {
    let ctx = TestContext::new();
    ctx.email.bounce("ana@example.com");

    let (status, body) = ctx
        .post(
            "confirm_manual_payment",
            Some(&ctx.customer_token("cust-1")),
            &json!({ "order": cart(), "reference": "ZL-TEST01" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["payment_reference"], "ZL-TEST01");

    let report = &body["notifications"];
    let customer = report["recipients"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["kind"] == "customer")
        .unwrap();
    assert_eq!(customer["delivered"], false);
    assert_eq!(ctx.backend.order_count().await, 1);
}

#[tokio::test]
async fn ready_for_pickup_reaches_the_customer_phone() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token("cust-1");
    let staff = ctx.staff_token();

    let mut with_phone = cart();
    with_phone["customer"]["phone"] = json!("512-555-0142");
    let (_, body) = ctx
        .post(
            "confirm_manual_payment",
            Some(&customer),
            &json!({ "order": with_phone }),
        )
        .await;
    let id = body["order"]["id"].clone();

    let (status, body) = ctx
        .post(
            "update_order_status",
            Some(&staff),
            &json!({ "order_id": id, "status": "ready" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["status"], "ready");
    assert_eq!(body["notifications"]["event"], "ready_for_pickup");

    let chats = ctx.chat.sent();
    let (to, message) = chats.last().unwrap();
    assert_eq!(to, "15125550142");
    assert!(matches!(message, ChatMessage::Text { .. }));

    // Fulfillment only moves forward.
    let (status, _) = ctx
        .post(
            "update_order_status",
            Some(&staff),
            &json!({ "order_id": id, "status": "received" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
