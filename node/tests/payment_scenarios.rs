//! Exercises the HTTP surface end to end against the in-memory backend.
//! Routes that would need a live chain RPC (`send`, `withdraw`, `balance`)
//! are only tested on their request-validation paths here; reaching the
//! payment engine itself needs a running Solana RPC endpoint, which these
//! tests don't stand up.

use std::sync::Arc;

use http_body_util::BodyExt;
use node::command::{Command, CommandHandlers};
use node::config::build_for_test;
use node::http::{router, AppState};
use node::kms_provider::AnyKmsProvider;
use serde_json::{json, Value};
use tower::ServiceExt;

use axum::body::Body;
use axum::http::{Request, StatusCode};

async fn test_state() -> (Arc<AppState>, Arc<CommandHandlers<AnyKmsProvider>>) {
    let handlers = Arc::new(build_for_test());
    (AppState::new(handlers.clone()), handlers)
}

async fn send_request(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let response = router(state).oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn send_payment_rejects_out_of_range_amount() {
    let (state, _handlers) = test_state().await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/payments/send")
        .header("content-type", "application/json")
        .header("x-user-id", uuid::Uuid::new_v4().to_string())
        .body(Body::from(
            json!({
                "recipientPhone": "+14155550102",
                "amount": "0.001",
                "token": "USDC",
                "idempotencyKey": "k-001-aaaaaaaaaaaaaaaa",
            })
            .to_string(),
        ))
        .unwrap();

    let (status, body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], 1);
}

#[tokio::test]
async fn send_payment_rejects_short_idempotency_key() {
    let (state, _handlers) = test_state().await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/payments/send")
        .header("content-type", "application/json")
        .header("x-user-id", uuid::Uuid::new_v4().to_string())
        .body(Body::from(
            json!({
                "recipientPhone": "+14155550102",
                "amount": "25.00",
                "token": "USDC",
                "idempotencyKey": "tooshort",
            })
            .to_string(),
        ))
        .unwrap();

    let (status, _body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn withdraw_rejects_malformed_destination_address() {
    let (state, _handlers) = test_state().await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/wallet/withdraw")
        .header("content-type", "application/json")
        .header("x-user-id", uuid::Uuid::new_v4().to_string())
        .body(Body::from(
            json!({
                "destinationAddress": "tooshort",
                "amount": "25.00",
                "token": "USDC",
                "idempotencyKey": "k-001-aaaaaaaaaaaaaaaa",
            })
            .to_string(),
        ))
        .unwrap();

    let (status, _body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_history_requires_the_x_user_id_header() {
    let (state, _handlers) = test_state().await;
    let req = Request::builder().method("GET").uri("/api/payments/history").body(Body::empty()).unwrap();

    let (status, _body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_history_is_empty_for_a_fresh_user() {
    let (state, _handlers) = test_state().await;
    let user_id = uuid::Uuid::new_v4();
    let req = Request::builder()
        .method("GET")
        .uri("/api/payments/history")
        .header("x-user-id", user_id.to_string())
        .body(Body::empty())
        .unwrap();

    let (status, body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn request_otp_rejects_an_unregistered_phone_number() {
    let (state, _handlers) = test_state().await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/request-otp")
        .header("content-type", "application/json")
        .body(Body::from(json!({"phoneNumber": "+19999999999"}).to_string()))
        .unwrap();

    let (status, _body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_otp_flow_issues_a_session_token_for_a_registered_user() {
    let (state, handlers) = test_state().await;
    handlers
        .dispatch(Command::RegisterUser {
            phone_number: "+14155550101".to_string(),
        })
        .await
        .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/request-otp")
        .header("content-type", "application/json")
        .body(Body::from(json!({"phoneNumber": "+14155550101"}).to_string()))
        .unwrap();
    let (status, _body) = send_request(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/verify-otp")
        .header("content-type", "application/json")
        .body(Body::from(json!({"phoneNumber": "+14155550101", "code": "000000"}).to_string()))
        .unwrap();
    let (status, body) = send_request(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/verify-otp")
        .header("content-type", "application/json")
        .body(Body::from(json!({"phoneNumber": "+14155550101", "code": "999999"}).to_string()))
        .unwrap();
    let (status, _body) = send_request(state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
