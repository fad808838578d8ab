//! # Integration Tests for soulmint-api
//!
//! Exercises the HTTP surface against the in-memory stores: issuer
//! opening, credit purchase idempotency, mint admission (including the
//! 402 path), status polling across pipeline passes, token lookup, and
//! revocation conflicts.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use soulmint_api::state::AppState;
use soulmint_engine::{
    AdmissionService, ConfirmationReconciler, EngineConfig, MintPipeline,
};
use soulmint_ledger::CreditLedger;
use soulmint_registry::CredentialRegistry;
use soulmint_relay::{ChainRelayer, MockChainRelayer, MockStorageUploader, StorageUploader};

/// The app plus direct handles to the workers, so tests can drive the
/// asynchronous lifecycle deterministically between requests.
struct TestStack {
    app: axum::Router,
    pipeline: MintPipeline,
    reconciler: ConfirmationReconciler,
}

fn test_stack() -> TestStack {
    let config = EngineConfig::default();
    let ledger = Arc::new(CreditLedger::new());
    let registry = Arc::new(CredentialRegistry::new());
    let uploader: Arc<dyn StorageUploader> = Arc::new(MockStorageUploader::new());
    let relayer: Arc<dyn ChainRelayer> = Arc::new(MockChainRelayer::new("mock-chain"));

    let admission = AdmissionService::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        config.mint_price,
    );
    let pipeline = MintPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        uploader,
        Arc::clone(&relayer),
        config.clone(),
    );
    let reconciler = ConfirmationReconciler::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        relayer,
        config,
    );

    TestStack {
        app: soulmint_api::app(AppState::new(ledger, registry, admission)),
        pipeline,
        reconciler,
    }
}

/// Helper: POST a JSON body.
async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Helper: GET a path.
async fn get(app: &axum::Router, uri: &str) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper: open an issuer and fund it, returning the issuer id string.
async fn funded_issuer(app: &axum::Router, credits: u64) -> String {
    let response = post_json(
        app,
        "/v1/issuers",
        serde_json::json!({"display_name": "Test Issuer"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let account = body_json(response).await;
    let issuer_id = account["id"].as_str().unwrap().to_string();

    let response = post_json(
        app,
        "/v1/credits/purchase",
        serde_json::json!({
            "issuer_id": issuer_id,
            "amount": credits,
            "payment_ref": format!("stripe:pi_{issuer_id}"),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    issuer_id
}

fn mint_body(issuer_id: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer_id": issuer_id,
        "recipient": "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
        "metadata": {"name": "Course Completion", "grade": "A"},
        "external_ref": "lms-cert-42",
    })
}

// ── Health Probes ───────────────────────────────────────────────────────

#[tokio::test]
async fn liveness_probe() {
    let stack = test_stack();
    let response = get(&stack.app, "/health/liveness").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_reports_queue_depth() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 5).await;
    post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;

    let response = get(&stack.app, "/health/readiness").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["queued"], 1);
}

// ── Issuers and Credits ─────────────────────────────────────────────────

#[tokio::test]
async fn open_issuer_starts_at_zero_balance() {
    let stack = test_stack();
    let response = post_json(
        &stack.app,
        "/v1/issuers",
        serde_json::json!({"display_name": "Fresh Issuer"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let account = body_json(response).await;

    let response = get(
        &stack.app,
        &format!("/v1/issuers/{}/balance", account["id"].as_str().unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["balance"], serde_json::json!("0"));
}

#[tokio::test]
async fn empty_display_name_is_422() {
    let stack = test_stack();
    let response = post_json(
        &stack.app,
        "/v1/issuers",
        serde_json::json!({"display_name": "  "}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn replayed_payment_ref_is_409_with_no_double_credit() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 5).await;

    let replay = serde_json::json!({
        "issuer_id": issuer,
        "amount": 5,
        "payment_ref": format!("stripe:pi_{issuer}"),
    });
    let response = post_json(&stack.app, "/v1/credits/purchase", replay).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "DUPLICATE_PAYMENT");

    let response = get(&stack.app, &format!("/v1/issuers/{issuer}/balance")).await;
    let body = body_json(response).await;
    assert_eq!(body["balance"], serde_json::json!("5"));
}

#[tokio::test]
async fn negative_purchase_amount_is_422() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 5).await;
    let response = post_json(
        &stack.app,
        "/v1/credits/purchase",
        serde_json::json!({
            "issuer_id": issuer,
            "amount": -3,
            "payment_ref": "stripe:pi_negative",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_issuer_balance_is_404() {
    let stack = test_stack();
    let response = get(
        &stack.app,
        &format!("/v1/issuers/{}/balance", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── Mint Admission ──────────────────────────────────────────────────────

#[tokio::test]
async fn mint_returns_201_queued_and_debits() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;

    let response = post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "QUEUED");
    assert!(body["credential_id"].is_string());

    let response = get(&stack.app, &format!("/v1/issuers/{issuer}/balance")).await;
    let body = body_json(response).await;
    assert_eq!(body["balance"], serde_json::json!("2"));
}

#[tokio::test]
async fn mint_without_credits_is_402() {
    let stack = test_stack();
    let response = post_json(
        &stack.app,
        "/v1/issuers",
        serde_json::json!({"display_name": "Broke Issuer"}),
    )
    .await;
    let account = body_json(response).await;
    let issuer = account["id"].as_str().unwrap().to_string();

    let response = post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_CREDITS");
    assert!(body["error"]["details"]["available"].is_string());
}

#[tokio::test]
async fn malformed_recipient_is_422() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;
    let mut body = mint_body(&issuer);
    body["recipient"] = serde_json::json!("not-an-address");

    let response = post_json(&stack.app, "/v1/credentials", body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Nothing was debited for the rejected request.
    let response = get(&stack.app, &format!("/v1/issuers/{issuer}/balance")).await;
    let body = body_json(response).await;
    assert_eq!(body["balance"], serde_json::json!("3"));
}

// ── Lifecycle: Poll, Token Lookup, Revoke ───────────────────────────────

#[tokio::test]
async fn mint_then_poll_through_confirmation() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;

    let response = post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;
    let body = body_json(response).await;
    let credential_id = body["credential_id"].as_str().unwrap().to_string();

    let response = get(&stack.app, &format!("/v1/credentials/{credential_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "QUEUED");
    assert_eq!(body["external_ref"], "lms-cert-42");

    // Drive the background lifecycle by hand.
    stack.pipeline.run_once().await.unwrap();
    let response = get(&stack.app, &format!("/v1/credentials/{credential_id}")).await;
    let body = body_json(response).await;
    assert_eq!(body["status"], "PENDING");
    assert!(body["tx_hash"].is_string());

    stack.reconciler.run_once().await;
    let response = get(&stack.app, &format!("/v1/credentials/{credential_id}")).await;
    let body = body_json(response).await;
    assert_eq!(body["status"], "CONFIRMED");
    assert_eq!(body["token_id"], "1");

    // Token lookup resolves to the same credential.
    let response = get(&stack.app, "/v1/credentials/token/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], serde_json::json!(credential_id));
}

#[tokio::test]
async fn unknown_credential_is_404() {
    let stack = test_stack();
    let response = get(
        &stack.app,
        &format!("/v1/credentials/{}", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_token_lookup_is_404() {
    let stack = test_stack();
    let response = get(&stack.app, "/v1/credentials/token/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoke_before_confirmation_is_409() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;
    let response = post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;
    let body = body_json(response).await;
    let credential_id = body["credential_id"].as_str().unwrap().to_string();

    let response = post_json(
        &stack.app,
        &format!("/v1/credentials/{credential_id}/revoke"),
        serde_json::json!({"issuer_id": issuer}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn revoke_by_non_owner_is_403() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;
    let other = funded_issuer(&stack.app, 3).await;

    let response = post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;
    let body = body_json(response).await;
    let credential_id = body["credential_id"].as_str().unwrap().to_string();

    stack.pipeline.run_once().await.unwrap();
    stack.reconciler.run_once().await;

    let response = post_json(
        &stack.app,
        &format!("/v1/credentials/{credential_id}/revoke"),
        serde_json::json!({"issuer_id": other}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn revoke_confirmed_credential_succeeds() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;
    let response = post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;
    let body = body_json(response).await;
    let credential_id = body["credential_id"].as_str().unwrap().to_string();

    stack.pipeline.run_once().await.unwrap();
    stack.reconciler.run_once().await;

    let response = post_json(
        &stack.app,
        &format!("/v1/credentials/{credential_id}/revoke"),
        serde_json::json!({"issuer_id": issuer}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "REVOKED");

    // No refund on revocation; the mint happened.
    let response = get(&stack.app, &format!("/v1/issuers/{issuer}/balance")).await;
    let body = body_json(response).await;
    assert_eq!(body["balance"], serde_json::json!("2"));
}

#[tokio::test]
async fn transactions_history_shape() {
    let stack = test_stack();
    let issuer = funded_issuer(&stack.app, 3).await;
    post_json(&stack.app, "/v1/credentials", mint_body(&issuer)).await;

    let response = get(&stack.app, &format!("/v1/issuers/{issuer}/transactions")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let kinds: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["PURCHASE", "DEDUCT"]);
}
