mod common;

use acessivision_backend::infrastructure::collaborators::UnconfiguredPaymentGateway;
use acessivision_backend::services::payment::PaymentStatus;
use axum::{Router, http::StatusCode};
use chrono::{DateTime, Duration, Utc};
use common::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Register and sign in, returning (uid, token).
async fn sign_up(app: &Router, email: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({ "email": email, "password": "segredo1", "name": "Teste" }),
            None,
        ))
        .await
        .unwrap();
    let uid = body_json(response).await["uid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": email, "password": "segredo1" }),
            None,
        ))
        .await
        .unwrap();
    let token = body_json(response).await["token"].as_str().unwrap().to_string();
    (uid, token)
}

async fn plan_status(app: &Router, token: &str) -> Value {
    let response = app
        .clone()
        .oneshot(empty_request("GET", "/plans/status", Some(token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn notify(app: &Router, payment_id: &str) -> StatusCode {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/billing/webhook",
            json!({ "type": "payment", "action": "payment.updated", "data": { "id": payment_id } }),
            None,
        ))
        .await
        .unwrap()
        .status()
}

fn expires_at(status: &Value) -> DateTime<Utc> {
    status["expires_at"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_plan_catalog_is_public() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) = account_app(tmp.path(), FakeGateway::new()).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/plans", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let plans = body_json(response).await;
    assert_eq!(plans[0]["id"], "free");
    assert_eq!(plans[1]["id"], "premium");
    assert_eq!(plans[1]["price_cents"], 990);
    assert_eq!(plans[1]["currency"], "BRL");

    let response = app
        .oneshot(empty_request("GET", "/plans/status", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_approved_payment_grants_premium_once() {
    let tmp = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::new();
    let (app, _state) = account_app(tmp.path(), gateway.clone()).await;
    let (_uid, token) = sign_up(&app, "ana@example.com").await;

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/billing", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let billing = body_json(response).await;
    assert_eq!(billing["status"], "pending");
    assert_eq!(billing["amount_cents"], 990);
    assert!(billing["qr_code"].as_str().unwrap().starts_with("00020126"));
    let payment_id = billing["payment_id"].as_str().unwrap().to_string();

    {
        let charges = gateway.charges.lock().unwrap();
        assert_eq!(charges[0].payer_email, "ana@example.com");
        assert_eq!(charges[0].external_reference, billing["billing_id"].as_str().unwrap());
    }

    // Still pending: nothing changes
    assert_eq!(notify(&app, &payment_id).await, StatusCode::OK);
    assert_eq!(plan_status(&app, &token).await["plan"], "free");

    gateway.set_status(&payment_id, PaymentStatus::Approved);
    let before = Utc::now();
    assert_eq!(notify(&app, &payment_id).await, StatusCode::OK);

    let status = plan_status(&app, &token).await;
    assert_eq!(status["plan"], "premium");
    assert_eq!(status["is_premium"], true);
    let first_expiry = expires_at(&status);
    assert!(first_expiry >= before + Duration::days(30));
    assert!(first_expiry <= Utc::now() + Duration::days(30));

    // Redelivery is a no-op
    assert_eq!(notify(&app, &payment_id).await, StatusCode::OK);
    assert_eq!(expires_at(&plan_status(&app, &token).await), first_expiry);
}

#[tokio::test]
async fn test_charge_approved_on_creation_grants_premium() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) =
        account_app(tmp.path(), FakeGateway::opening_as(PaymentStatus::Approved)).await;
    let (_uid, token) = sign_up(&app, "ana@example.com").await;

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/billing", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let billing = body_json(response).await;
    assert_eq!(billing["status"], "paid");

    let status = plan_status(&app, &token).await;
    assert_eq!(status["plan"], "premium");
    let expiry = expires_at(&status);

    // The later webhook for the same payment changes nothing
    let payment_id = billing["payment_id"].as_str().unwrap().to_string();
    assert_eq!(notify(&app, &payment_id).await, StatusCode::OK);
    assert_eq!(expires_at(&plan_status(&app, &token).await), expiry);
}

#[tokio::test]
async fn test_charge_rejected_on_creation_is_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) =
        account_app(tmp.path(), FakeGateway::opening_as(PaymentStatus::Rejected)).await;
    let (_uid, token) = sign_up(&app, "ana@example.com").await;

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/billing", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["status"], "rejected");
    assert_eq!(plan_status(&app, &token).await["plan"], "free");
}

#[tokio::test]
async fn test_unknown_or_foreign_events_are_acknowledged() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) = account_app(tmp.path(), FakeGateway::new()).await;

    assert_eq!(notify(&app, "999999").await, StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "POST",
            "/billing/webhook",
            json!({ "type": "merchant_order", "data": { "id": 5 } }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "received": true }));
}

#[tokio::test]
async fn test_expired_premium_is_downgraded_on_status_check() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, state) = account_app(tmp.path(), FakeGateway::new()).await;
    let (uid, token) = sign_up(&app, "ana@example.com").await;

    // Granted 31 days ago for 30 days
    state
        .plans
        .grant_premium(&uid, 30, Utc::now() - Duration::days(31))
        .await
        .unwrap();

    let status = plan_status(&app, &token).await;
    assert_eq!(status["plan"], "free");
    assert_eq!(status["is_premium"], false);
    assert_eq!(status["expires_at"], Value::Null);
}

#[tokio::test]
async fn test_billing_without_provider_is_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) = account_app(tmp.path(), Arc::new(UnconfiguredPaymentGateway)).await;
    let (_uid, token) = sign_up(&app, "ana@example.com").await;

    let response = app
        .oneshot(empty_request("POST", "/billing", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
