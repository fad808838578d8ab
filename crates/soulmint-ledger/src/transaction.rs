//! # Credit Transactions — Immutable Ledger Rows
//!
//! A [`CreditTransaction`] records one balance change for one issuer
//! account. Rows are immutable: once appended they are never updated or
//! deleted, so the log can always be replayed to reconstruct the balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use soulmint_core::{CreditAmount, CredentialId, IssuerId, PaymentRef, Timestamp, TransactionId};

/// The kind of a credit transaction. Determines the sign of the delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Credits bought by the issuer (positive delta).
    Purchase,
    /// Credits consumed by a mint admission (negative delta).
    Deduct,
    /// Compensation for a credential that reached FAILED (positive delta).
    Refund,
    /// Administrative correction (signed delta).
    Adjustment,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Purchase => "PURCHASE",
            Self::Deduct => "DEDUCT",
            Self::Refund => "REFUND",
            Self::Adjustment => "ADJUSTMENT",
        };
        f.write_str(s)
    }
}

/// One immutable row in an issuer's credit transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction identifier.
    pub id: TransactionId,
    /// The account this row belongs to.
    pub account: IssuerId,
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Magnitude of the balance change. The sign comes from the kind
    /// (see [`Self::signed_delta`]); adjustments carry it explicitly.
    pub amount: CreditAmount,
    /// Explicit signed delta for `ADJUSTMENT` rows; `None` otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment_delta: Option<Decimal>,
    /// Balance of the account immediately after this row was appended.
    pub balance_after: CreditAmount,
    /// External payment reference (unique across the ledger), for
    /// idempotent purchase reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<PaymentRef>,
    /// The credential this row is tied to (deducts and refunds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialId>,
    /// When the row was appended.
    pub created_at: Timestamp,
}

impl CreditTransaction {
    /// The signed balance delta this row applied.
    pub fn signed_delta(&self) -> Decimal {
        match self.kind {
            TransactionKind::Purchase | TransactionKind::Refund => self.amount.as_decimal(),
            TransactionKind::Deduct => -self.amount.as_decimal(),
            TransactionKind::Adjustment => self
                .adjustment_delta
                .unwrap_or_else(|| self.amount.as_decimal()),
        }
    }
}
