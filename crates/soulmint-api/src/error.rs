//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from the ledger, registry, and engine to HTTP status
//! codes with JSON error bodies. Never exposes internal error details in
//! 500-class responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use soulmint_engine::AdmissionError;
use soulmint_ledger::LedgerError;
use soulmint_registry::RegistryError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface. The `details` field carries additional context for client
/// errors but is omitted for 500-class errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "INSUFFICIENT_CREDITS").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// The issuer's balance cannot cover the operation (402).
    #[error("insufficient credits: {message}")]
    InsufficientCredits {
        message: String,
        details: serde_json::Value,
    },

    /// A replayed payment reference (409).
    #[error("duplicate payment: {0}")]
    DuplicatePayment(String),

    /// Conflict with the resource's current state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller does not own the resource (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::InsufficientCredits { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_CREDITS")
            }
            Self::DuplicatePayment(_) => (StatusCode::CONFLICT, "DUPLICATE_PAYMENT"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        let details = match &self {
            Self::InsufficientCredits { details, .. } => Some(details.clone()),
            _ => None,
        };

        if let Self::Internal(_) = &self {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::UnknownIssuer { .. } | AdmissionError::NotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            AdmissionError::InvalidRecipient(_) | AdmissionError::InvalidMetadata(_) => {
                Self::Validation(err.to_string())
            }
            AdmissionError::InsufficientCredits {
                requested,
                available,
            } => Self::InsufficientCredits {
                message: format!("requested {requested}, available {available}"),
                details: serde_json::json!({
                    "requested": requested,
                    "available": available,
                }),
            },
            AdmissionError::NotOwner { .. } => Self::Forbidden(err.to_string()),
            AdmissionError::NotRevocable { .. } => Self::Conflict(err.to_string()),
            AdmissionError::Ledger(inner) => Self::from(inner),
            AdmissionError::Registry(inner) => Self::from(inner),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownAccount { .. } => Self::NotFound(err.to_string()),
            LedgerError::InsufficientFunds {
                requested,
                available,
            } => Self::InsufficientCredits {
                message: format!("requested {requested}, available {available}"),
                details: serde_json::json!({
                    "requested": requested,
                    "available": available,
                }),
            },
            LedgerError::DuplicatePayment { .. } => Self::DuplicatePayment(err.to_string()),
            LedgerError::DuplicateDebit { .. }
            | LedgerError::AlreadyRefunded { .. }
            | LedgerError::MissingDebit { .. }
            | LedgerError::AdjustmentBelowZero { .. }
            | LedgerError::BalanceOverflow { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { .. } => Self::NotFound(err.to_string()),
            RegistryError::InvalidTransition { .. } | RegistryError::TokenIdTaken { .. } => {
                Self::Conflict(err.to_string())
            }
            RegistryError::StaleChunk { .. } => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use soulmint_core::CreditAmount;

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing credential".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn insufficient_credits_is_402() {
        let err = AppError::from(AdmissionError::InsufficientCredits {
            requested: CreditAmount::from_credits(1),
            available: CreditAmount::zero(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(code, "INSUFFICIENT_CREDITS");
    }

    #[test]
    fn duplicate_payment_is_409() {
        let err = AppError::from(LedgerError::DuplicatePayment {
            payment_ref: soulmint_core::PaymentRef::new("stripe:pi_1").unwrap(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "DUPLICATE_PAYMENT");
    }

    #[test]
    fn registry_transition_is_conflict() {
        let err = AppError::from(RegistryError::NotFound {
            id: soulmint_core::CredentialId::new(),
        });
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn into_response_insufficient_credits_carries_details() {
        let err = AppError::from(AdmissionError::InsufficientCredits {
            requested: CreditAmount::from_credits(2),
            available: CreditAmount::from_credits(1),
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body.error.code, "INSUFFICIENT_CREDITS");
        assert!(body.error.details.is_some());
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("dashmap poisoned".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("dashmap"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(body.error.details.is_none());
    }

    #[test]
    fn error_body_skips_null_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "TEST".to_string(),
                message: "test message".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("details"));
    }
}
