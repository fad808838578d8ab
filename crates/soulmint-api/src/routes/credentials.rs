//! # Credential API
//!
//! Mint admission, status polling, token lookup, and revocation. Minting
//! is asynchronous: the POST returns as soon as the credential is queued
//! and debited, and clients poll the credential document (or look it up by
//! token id once confirmed) to follow the lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use soulmint_core::{CredentialId, IssuerId, TokenId};
use soulmint_engine::MintRequest;
use soulmint_registry::{Credential, CredentialStatus};

use crate::error::AppError;
use crate::state::AppState;

/// Request to mint a credential.
#[derive(Debug, Deserialize)]
pub struct MintCredentialRequest {
    /// The paying issuer's account id.
    pub issuer_id: Uuid,
    /// Wallet address to mint to (0x-prefixed, 40 hex chars).
    pub recipient: String,
    /// Credential document — non-empty JSON object.
    pub metadata: serde_json::Value,
    /// Issuer's own correlation reference, stored opaquely.
    pub external_ref: Option<String>,
}

/// Response for an admitted mint.
#[derive(Debug, Serialize, Deserialize)]
pub struct MintCredentialResponse {
    /// The queued credential's id; poll `GET /v1/credentials/{id}`.
    pub credential_id: CredentialId,
    /// Always QUEUED at admission.
    pub status: CredentialStatus,
}

/// Request to revoke a confirmed credential.
#[derive(Debug, Deserialize)]
pub struct RevokeCredentialRequest {
    /// The owning issuer's account id.
    pub issuer_id: Uuid,
}

/// Build the credentials router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/credentials", post(mint_credential))
        .route("/v1/credentials/{id}", get(get_credential))
        .route("/v1/credentials/token/{token_id}", get(get_by_token))
        .route("/v1/credentials/{id}/revoke", post(revoke_credential))
}

/// POST /v1/credentials — admit a mint request.
async fn mint_credential(
    State(state): State<AppState>,
    Json(req): Json<MintCredentialRequest>,
) -> Result<(StatusCode, Json<MintCredentialResponse>), AppError> {
    let credential = state.admission.mint(
        IssuerId(req.issuer_id),
        MintRequest {
            recipient: req.recipient,
            metadata: req.metadata,
            external_ref: req.external_ref,
        },
    )?;

    Ok((
        StatusCode::CREATED,
        Json(MintCredentialResponse {
            credential_id: credential.id,
            status: credential.status,
        }),
    ))
}

/// GET /v1/credentials/{id} — full credential status document.
async fn get_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Credential>, AppError> {
    let id = CredentialId(id);
    state
        .registry
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("unknown credential: {id}")))
}

/// GET /v1/credentials/token/{token_id} — look up a confirmed credential
/// by its on-chain token identifier.
async fn get_by_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Json<Credential>, AppError> {
    let token_id =
        TokenId::new(token_id).map_err(|e| AppError::Validation(e.to_string()))?;
    state
        .registry
        .get_by_token(&token_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no credential for token: {token_id}")))
}

/// POST /v1/credentials/{id}/revoke — issuer-owned revocation.
async fn revoke_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RevokeCredentialRequest>,
) -> Result<Json<Credential>, AppError> {
    let credential = state
        .admission
        .revoke(IssuerId(req.issuer_id), CredentialId(id))?;
    Ok(Json(credential))
}
