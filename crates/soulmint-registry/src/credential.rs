//! # Credential Lifecycle State Machine
//!
//! Models the life of a soulbound-token credential from submission to
//! on-chain finality.
//!
//! ## States
//!
//! ```text
//! QUEUED ──(upload + submit succeed)──▶ PENDING
//!    │                                     │
//!    │ (validation/upload/submit fails)    │ (chain confirms)
//!    ▼                                     ▼
//! FAILED ◀──(chain rejects / times out)─ CONFIRMED ──(issuer revokes)──▶ REVOKED
//! ```
//!
//! The transition table is encoded once, in
//! [`CredentialStatus::can_transition_to`]. The registry consults it before
//! every status write, so no caller can skip a lifecycle state or write a
//! transition outside the table; the pipeline's batch commit additionally
//! requires its rows to still be QUEUED at commit time.
//!
//! ## Design Decision
//!
//! A flat enum with validated transitions rather than typestate: the store
//! holds credentials of every status in one map and the pipeline moves them
//! between statuses at runtime, so the invariant (only table transitions,
//! checked atomically with the write) lives in the registry's
//! compare-and-set operations.

use serde::{Deserialize, Serialize};

use soulmint_core::{
    CredentialId, CredentialMetadata, IssuerId, RecipientAddress, Timestamp, TokenId,
    TransactionId, TxHash,
};

/// The lifecycle status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    /// Admitted and debited, waiting for the minting pipeline.
    Queued,
    /// Mint transaction submitted, waiting for chain confirmation.
    Pending,
    /// Mint confirmed on chain; token identifier assigned (terminal unless revoked).
    Confirmed,
    /// Validation, upload, submission, or chain confirmation failed (terminal).
    Failed,
    /// Revoked by the issuer after confirmation (terminal).
    Revoked,
}

impl CredentialStatus {
    /// Whether this status accepts no further transitions from the
    /// pipeline or reconciler. CONFIRMED still accepts the administrative
    /// revoke.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Revoked)
    }

    /// The lifecycle transition table.
    pub fn can_transition_to(&self, next: CredentialStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Self::Queued, Self::Pending)
                | (Self::Queued, Self::Failed)
                | (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Failed)
                | (Self::Confirmed, Self::Revoked)
        )
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "QUEUED",
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
            Self::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// A soulbound-token credential tracked from request through finality.
///
/// Field nullability follows the lifecycle: `storage_ref` is set once the
/// metadata upload succeeds, `tx_hash` once the mint transaction is
/// submitted, `token_id` and `confirmed_at` only when the chain confirms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Unique credential identifier.
    pub id: CredentialId,
    /// The issuer that requested the mint.
    pub issuer: IssuerId,
    /// Recipient wallet address.
    pub recipient: RecipientAddress,
    /// Issuer-supplied external reference (student id, order number, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// The metadata document to be placed in permanent storage.
    pub metadata: CredentialMetadata,
    /// Permanent-storage content reference; set after a successful upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
    /// Chain transaction hash; set after a successful submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    /// On-chain token identifier; set only when CONFIRMED. Unique among
    /// confirmed credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    /// Current lifecycle status.
    pub status: CredentialStatus,
    /// Why the credential reached FAILED, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Audit back-reference to the admission debit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debit_tx: Option<TransactionId>,
    /// Audit back-reference to the compensating refund, if one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_tx: Option<TransactionId>,
    /// When the credential was admitted.
    pub created_at: Timestamp,
    /// When the credential last changed status.
    pub updated_at: Timestamp,
    /// When the chain confirmed the mint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<Timestamp>,
}
