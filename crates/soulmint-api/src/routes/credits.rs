//! # Credit and Issuer API
//!
//! Issuer account opening, credit purchases, and balance/history queries.
//! Purchases are idempotent on the payment reference: a replayed delivery
//! of the same payment is a 409 with no balance change.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use soulmint_core::{CreditAmount, IssuerId, PaymentRef};
use soulmint_ledger::{CreditTransaction, IssuerAccount};

use crate::error::AppError;
use crate::state::AppState;

/// Request to open an issuer account.
#[derive(Debug, Deserialize)]
pub struct OpenIssuerRequest {
    /// Display name for the account.
    pub display_name: String,
}

/// Request to credit an account from an external payment.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// The account to credit.
    pub issuer_id: Uuid,
    /// Credits purchased; must be non-negative.
    pub amount: Decimal,
    /// External payment reference; funds at most one purchase, ever.
    pub payment_ref: String,
}

/// Balance snapshot response.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub issuer_id: Uuid,
    pub balance: CreditAmount,
}

/// Build the credits and issuers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/issuers", post(open_issuer))
        .route("/v1/issuers/{id}/balance", get(get_balance))
        .route("/v1/issuers/{id}/transactions", get(get_transactions))
        .route("/v1/credits/purchase", post(purchase_credits))
}

/// POST /v1/issuers — open an issuer account with a zero balance.
async fn open_issuer(
    State(state): State<AppState>,
    Json(req): Json<OpenIssuerRequest>,
) -> Result<(StatusCode, Json<IssuerAccount>), AppError> {
    if req.display_name.trim().is_empty() {
        return Err(AppError::Validation(
            "display_name must not be empty".to_string(),
        ));
    }
    let account = state.ledger.open_account(req.display_name);
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /v1/credits/purchase — credit an account from an external payment.
async fn purchase_credits(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<CreditTransaction>), AppError> {
    let amount =
        CreditAmount::new(req.amount).map_err(|e| AppError::Validation(e.to_string()))?;
    let payment_ref =
        PaymentRef::new(req.payment_ref).map_err(|e| AppError::Validation(e.to_string()))?;

    let tx = state
        .ledger
        .purchase(IssuerId(req.issuer_id), amount, payment_ref)?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /v1/issuers/{id}/balance — current credit balance.
async fn get_balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.ledger.balance(IssuerId(id))?;
    Ok(Json(BalanceResponse {
        issuer_id: id,
        balance,
    }))
}

/// GET /v1/issuers/{id}/transactions — full ledger history, append order.
async fn get_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CreditTransaction>>, AppError> {
    let history = state.ledger.history(IssuerId(id))?;
    Ok(Json(history))
}
