//! # Credential Registry Operations
//!
//! In-memory credential store backed by `DashMap`. Status transitions are
//! compare-and-set: the precondition check runs under the same per-entry
//! write lock as the mutation, so a transition outside the lifecycle table
//! (or a stale writer) is rejected without touching the row.
//!
//! ## Batch Commit
//!
//! The minting pipeline stages a chunk of updates while processing and
//! commits them in one call. [`CredentialRegistry::commit`] validates every
//! precondition before applying any update, under a registry-wide commit
//! mutex, so a chunk is all-or-nothing: a stale row aborts the whole chunk
//! with no partial writes, and the pipeline retries on its next pass.

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use soulmint_core::{
    CredentialId, CredentialMetadata, IssuerId, RecipientAddress, Timestamp, TokenId,
    TransactionId, TxHash,
};

use crate::credential::{Credential, CredentialStatus};

/// Errors from credential registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The credential does not exist.
    #[error("unknown credential: {id}")]
    NotFound {
        /// The credential that was referenced.
        id: CredentialId,
    },

    /// The attempted transition is not in the lifecycle table, or the row
    /// is no longer in the expected source state.
    #[error("invalid credential transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// The credential being transitioned.
        id: CredentialId,
        /// Observed current status.
        from: CredentialStatus,
        /// Attempted target status.
        to: CredentialStatus,
    },

    /// The token identifier is already bound to another credential.
    #[error("token identifier already assigned: {token_id}")]
    TokenIdTaken {
        /// The conflicting token identifier.
        token_id: TokenId,
    },

    /// A staged chunk referenced a row that moved out of QUEUED since it
    /// was read. The whole chunk is aborted.
    #[error("stale chunk: credential {id} is {actual}, expected QUEUED")]
    StaleChunk {
        /// The stale row.
        id: CredentialId,
        /// Its observed status at commit time.
        actual: CredentialStatus,
    },
}

/// Opaque paging cursor over the QUEUED set, ordered oldest-created first.
///
/// The pipeline driver owns cursor state explicitly; the registry exposes a
/// pure `(after, limit) -> (items, next)` function over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueueCursor {
    created_at: Timestamp,
    id: CredentialId,
}

/// One staged status write produced by the pipeline's process phase.
#[derive(Debug, Clone)]
pub enum StagedUpdate {
    /// Upload and submission both succeeded: QUEUED -> PENDING.
    ToPending {
        /// The credential to advance.
        id: CredentialId,
        /// Permanent-storage content reference from the upload.
        storage_ref: String,
        /// Chain transaction hash from the submission.
        tx_hash: TxHash,
    },
    /// Validation, upload, or submission failed: QUEUED -> FAILED.
    ToFailed {
        /// The credential to fail.
        id: CredentialId,
        /// Storage reference, retained when the upload succeeded but the
        /// submission did not (kept for audit).
        storage_ref: Option<String>,
        /// What failed.
        reason: String,
    },
}

impl StagedUpdate {
    /// The credential this update targets.
    pub fn credential_id(&self) -> CredentialId {
        match self {
            Self::ToPending { id, .. } | Self::ToFailed { id, .. } => *id,
        }
    }
}

/// The credential store. Thread-safe; share via `Arc`.
#[derive(Debug, Default)]
pub struct CredentialRegistry {
    credentials: DashMap<CredentialId, Credential>,
    /// Token identifier -> credential, maintained for confirmed mints.
    token_index: DashMap<TokenId, CredentialId>,
    /// Serializes batch commits so chunk validation and application are
    /// one atomic unit even if a second pipeline instance ever runs.
    commit_lock: Mutex<()>,
}

impl CredentialRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Precondition for every status write: the move must be in the
    /// lifecycle table ([`CredentialStatus::can_transition_to`]).
    fn ensure_transition(row: &Credential, to: CredentialStatus) -> Result<(), RegistryError> {
        if row.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(RegistryError::InvalidTransition {
                id: row.id,
                from: row.status,
                to,
            })
        }
    }

    /// Create a credential in QUEUED with null storage, transaction, and
    /// token references.
    ///
    /// The identifier is supplied by admission, which generates it before
    /// the ledger debit so the deduct row can reference the credential.
    pub fn create(
        &self,
        id: CredentialId,
        issuer: IssuerId,
        recipient: RecipientAddress,
        metadata: CredentialMetadata,
        external_ref: Option<String>,
        debit_tx: Option<TransactionId>,
    ) -> Credential {
        let now = Timestamp::now();
        let credential = Credential {
            id,
            issuer,
            recipient,
            external_ref,
            metadata,
            storage_ref: None,
            tx_hash: None,
            token_id: None,
            status: CredentialStatus::Queued,
            failure_reason: None,
            debit_tx,
            refund_tx: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        };
        self.credentials.insert(id, credential.clone());
        tracing::info!(credential = %id, issuer = %issuer, "credential queued");
        credential
    }

    /// Fetch a credential by identifier.
    pub fn get(&self, id: CredentialId) -> Option<Credential> {
        self.credentials.get(&id).map(|entry| entry.clone())
    }

    /// Fetch a credential by its on-chain token identifier.
    pub fn get_by_token(&self, token_id: &TokenId) -> Option<Credential> {
        let id = *self.token_index.get(token_id)?;
        self.get(id)
    }

    /// All credentials in `status`, oldest-created first.
    ///
    /// With `require_tx_hash`, rows without a chain transaction reference
    /// are excluded (the reconciler's selection predicate).
    pub fn find_by_status(
        &self,
        status: CredentialStatus,
        require_tx_hash: bool,
    ) -> Vec<Credential> {
        let mut rows: Vec<Credential> = self
            .credentials
            .iter()
            .filter(|entry| {
                entry.status == status && (!require_tx_hash || entry.tx_hash.is_some())
            })
            .map(|entry| entry.clone())
            .collect();
        rows.sort_by_key(|c| (c.created_at, c.id));
        rows
    }

    /// One page of the QUEUED set strictly after `after`, oldest first.
    ///
    /// Returns the page and the cursor to resume from; `None` when the
    /// queue is exhausted.
    pub fn page_queued(
        &self,
        after: Option<QueueCursor>,
        limit: usize,
    ) -> (Vec<Credential>, Option<QueueCursor>) {
        let mut rows: Vec<Credential> = self
            .credentials
            .iter()
            .filter(|entry| entry.status == CredentialStatus::Queued)
            .filter(|entry| match after {
                Some(cursor) => (entry.created_at, entry.id) > (cursor.created_at, cursor.id),
                None => true,
            })
            .map(|entry| entry.clone())
            .collect();
        rows.sort_by_key(|c| (c.created_at, c.id));
        rows.truncate(limit);

        let cursor = if rows.len() < limit {
            None
        } else {
            rows.last().map(|c| QueueCursor {
                created_at: c.created_at,
                id: c.id,
            })
        };
        (rows, cursor)
    }

    /// Commit a processed chunk atomically.
    ///
    /// Every update's source row must still be QUEUED; otherwise the chunk
    /// aborts with [`RegistryError::StaleChunk`] and nothing is written.
    pub fn commit(&self, updates: Vec<StagedUpdate>) -> Result<(), RegistryError> {
        let _guard = self.commit_lock.lock();

        // Validate the whole chunk before touching any row.
        for update in &updates {
            let id = update.credential_id();
            let row = self
                .credentials
                .get(&id)
                .ok_or(RegistryError::NotFound { id })?;
            if row.status != CredentialStatus::Queued {
                return Err(RegistryError::StaleChunk {
                    id,
                    actual: row.status,
                });
            }
        }

        // Apply. No other writer targets QUEUED rows, and the commit lock
        // excludes concurrent chunks, so the validated preconditions hold.
        let now = Timestamp::now();
        for update in updates {
            match update {
                StagedUpdate::ToPending {
                    id,
                    storage_ref,
                    tx_hash,
                } => {
                    if let Some(mut row) = self.credentials.get_mut(&id) {
                        row.status = CredentialStatus::Pending;
                        row.storage_ref = Some(storage_ref);
                        row.tx_hash = Some(tx_hash);
                        row.updated_at = now;
                        tracing::info!(credential = %id, "credential pending confirmation");
                    }
                }
                StagedUpdate::ToFailed {
                    id,
                    storage_ref,
                    reason,
                } => {
                    if let Some(mut row) = self.credentials.get_mut(&id) {
                        row.status = CredentialStatus::Failed;
                        if storage_ref.is_some() {
                            row.storage_ref = storage_ref;
                        }
                        row.failure_reason = Some(reason.clone());
                        row.updated_at = now;
                        tracing::warn!(credential = %id, reason = %reason, "credential failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Finalize a PENDING credential as CONFIRMED, assigning its token
    /// identifier.
    ///
    /// Compare-and-set on PENDING; enforces token uniqueness among
    /// confirmed credentials.
    pub fn confirm(
        &self,
        id: CredentialId,
        token_id: TokenId,
        confirmed_at: Timestamp,
    ) -> Result<Credential, RegistryError> {
        let mut row = self
            .credentials
            .get_mut(&id)
            .ok_or(RegistryError::NotFound { id })?;
        Self::ensure_transition(&row, CredentialStatus::Confirmed)?;

        match self.token_index.entry(token_id.clone()) {
            dashmap::Entry::Occupied(existing) if *existing.get() != id => {
                return Err(RegistryError::TokenIdTaken { token_id });
            }
            dashmap::Entry::Occupied(_) => {}
            dashmap::Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        row.status = CredentialStatus::Confirmed;
        row.token_id = Some(token_id);
        row.confirmed_at = Some(confirmed_at);
        row.updated_at = Timestamp::now();
        tracing::info!(credential = %id, "credential confirmed");
        Ok(row.clone())
    }

    /// Fail a PENDING credential (chain rejection or confirmation timeout).
    ///
    /// The transaction hash is retained for audit.
    pub fn fail_pending(
        &self,
        id: CredentialId,
        reason: impl Into<String>,
    ) -> Result<Credential, RegistryError> {
        let mut row = self
            .credentials
            .get_mut(&id)
            .ok_or(RegistryError::NotFound { id })?;
        Self::ensure_transition(&row, CredentialStatus::Failed)?;
        let reason = reason.into();
        row.status = CredentialStatus::Failed;
        row.failure_reason = Some(reason.clone());
        row.updated_at = Timestamp::now();
        tracing::warn!(credential = %id, reason = %reason, "pending credential failed");
        Ok(row.clone())
    }

    /// Revoke a CONFIRMED credential (administrative path).
    ///
    /// The token identifier stays on the record for audit, but its lookup
    /// index entry is removed: the unique-token constraint covers confirmed
    /// credentials only, so the identifier may be confirmed again.
    pub fn revoke(&self, id: CredentialId) -> Result<Credential, RegistryError> {
        let mut row = self
            .credentials
            .get_mut(&id)
            .ok_or(RegistryError::NotFound { id })?;
        Self::ensure_transition(&row, CredentialStatus::Revoked)?;
        row.status = CredentialStatus::Revoked;
        row.updated_at = Timestamp::now();
        if let Some(token_id) = &row.token_id {
            self.token_index.remove(token_id);
        }
        tracing::info!(credential = %id, "credential revoked");
        Ok(row.clone())
    }

    /// Record the compensating refund transaction on a FAILED credential.
    pub fn record_refund(
        &self,
        id: CredentialId,
        refund_tx: TransactionId,
    ) -> Result<(), RegistryError> {
        let mut row = self
            .credentials
            .get_mut(&id)
            .ok_or(RegistryError::NotFound { id })?;
        row.refund_tx = Some(refund_tx);
        Ok(())
    }

    /// Number of credentials currently in `status`.
    pub fn count_by_status(&self, status: CredentialStatus) -> usize {
        self.credentials
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }
}
