//! # Error Types — Validation Failures at the Type Boundary
//!
//! Errors raised by the validated constructors in this crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! Higher layers define their own error enums (ledger, registry, relay,
//! engine) and wrap or map these where a core validation failure surfaces.

use thiserror::Error;

/// Validation errors from `soulmint-core` constructors.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A recipient address failed format validation.
    #[error("invalid recipient address: {0:?} (expected 0x-prefixed 40 hex chars)")]
    InvalidRecipientAddress(String),

    /// A chain transaction hash failed format validation.
    #[error("invalid transaction hash: {0:?} (expected 0x-prefixed 64 hex chars)")]
    InvalidTxHash(String),

    /// A token identifier was empty.
    #[error("token identifier must not be empty")]
    EmptyTokenId,

    /// A payment reference was empty.
    #[error("payment reference must not be empty")]
    EmptyPaymentRef,

    /// An amount was negative.
    #[error("credit amount must not be negative, got {0}")]
    NegativeAmount(rust_decimal::Decimal),

    /// Metadata is not a usable document.
    #[error("invalid credential metadata: {0}")]
    InvalidMetadata(String),

    /// A timestamp string failed validation.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
