//! Credential and origin checks, health endpoints.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    body::Body,
    http::{Method, StatusCode, header},
};
use panaderia_core::Role;
use panaderia_integration_tests::{ORIGIN, TestContext, request};
use serde_json::json;

fn cart() -> serde_json::Value {
    json!({
        "customer": { "name": "Ana", "email": "ana@example.com" },
        "items": [{ "name": "Tres Leches", "unit_price": "5.00", "quantity": 2 }]
    })
}

#[tokio::test]
async fn missing_or_forged_credentials_are_unauthenticated() {
    let ctx = TestContext::new();

    let (status, body) = ctx.post("create_or_update_order", None, &cart()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let forged = format!("{}0", ctx.customer_token("cust-1"));
    let (status, _) = ctx
        .post("create_or_update_order", Some(&forged), &cart())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .post("create_or_update_order", Some("not-a-token"), &cart())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.backend.order_count().await, 0);
}

#[tokio::test]
async fn disallowed_origin_is_refused_before_anything_runs() {
    let ctx = TestContext::new();
    let token = ctx.customer_token("cust-1");

    for origin in [Some("https://evil.example"), None] {
        let req = request(
            Method::POST,
            "/api/confirm_manual_payment",
            Some(&token),
            origin,
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "order": cart() }).to_string()))
        .unwrap();

        let (status, body) = ctx.send(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "origin {origin:?}");
        assert_eq!(body["error"], "Forbidden: forbidden origin");
    }

    assert_eq!(ctx.backend.order_count().await, 0);
    assert!(ctx.email.sent().is_empty());
}

#[tokio::test]
async fn origin_is_checked_before_the_credential() {
    let ctx = TestContext::new();
    let req = request(Method::GET, "/api/orders/1", None, Some("https://evil.example"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = ctx.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn allowed_origin_gets_cors_headers() {
    let ctx = TestContext::new();
    let req = request(Method::GET, "/health", None, Some(ORIGIN))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.router.clone(), req)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ORIGIN
    );
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn health_endpoints_need_no_credentials() {
    let ctx = TestContext::new();
    for path in ["/health", "/health/ready"] {
        let req = request(Method::GET, path, None, None)
            .body(Body::empty())
            .unwrap();
        let (status, _) = ctx.send(req).await;
        assert_eq!(status, StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn staff_only_actions_reject_customers() {
    let ctx = TestContext::new();
    let customer = ctx.token("cust-1", Role::Customer);

    let (status, _) = ctx
        .post(
            "respond_to_quote",
            Some(&customer),
            &json!({ "quote_id": 1, "status": "responded", "estimated_price": "10.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .post(
            "update_order_status",
            Some(&customer),
            &json!({ "order_id": 1, "status": "ready" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customers_cannot_create_orders_for_others() {
    let ctx = TestContext::new();
    let mut body = cart();
    body["owner_id"] = json!("cust-2");

    let (status, _) = ctx
        .post(
            "create_or_update_order",
            Some(&ctx.customer_token("cust-1")),
            &body,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = ctx
        .post("create_or_update_order", Some(&ctx.staff_token()), &body)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["order"]["owner_id"], "cust-2");
}
