//! # soulmint-api — HTTP surface for the SoulMint credential stack
//!
//! Thin axum layer over the engine: admission and queries are synchronous
//! in-memory operations, while the actual minting happens in the
//! background workers spawned by the binary.
//!
//! ## API Surface
//!
//! | Route                               | Domain                         |
//! |-------------------------------------|--------------------------------|
//! | `POST /v1/credentials`              | mint admission                 |
//! | `GET /v1/credentials/{id}`          | status polling                 |
//! | `GET /v1/credentials/token/{id}`    | lookup by confirmed token      |
//! | `POST /v1/credentials/{id}/revoke`  | issuer revocation              |
//! | `POST /v1/issuers`                  | account opening                |
//! | `POST /v1/credits/purchase`         | idempotent credit purchase     |
//! | `GET /v1/issuers/{id}/balance`      | balance snapshot               |
//! | `GET /v1/issuers/{id}/transactions` | ledger history                 |
//! | `GET /health/*`                     | probes                         |

pub mod error;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::credentials::router())
        .merge(routes::credits::router());

    Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health/liveness — process is up.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "alive"})))
}

/// GET /health/readiness — stores are reachable.
///
/// All state is in-process, so readiness reports queue depth rather than
/// dependency health.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let queued = state
        .registry
        .count_by_status(soulmint_registry::CredentialStatus::Queued);
    let pending = state
        .registry
        .count_by_status(soulmint_registry::CredentialStatus::Pending);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ready",
            "queued": queued,
            "pending": pending,
        })),
    )
}
