//! # Minting Pipeline
//!
//! A batch worker over the QUEUED set. Each pass drains the queue chunk by
//! chunk in three phases:
//!
//! ```text
//!   read     page QUEUED credentials, oldest first
//!   process  per credential: upload document, submit mint transaction
//!   write    commit the chunk's status changes atomically
//! ```
//!
//! Per-item failures are isolated: one credential's upload or submission
//! failure stages that credential as FAILED and never aborts the chunk.
//! Every external call is timeout-bounded, so a hung gateway cannot wedge
//! the worker.
//!
//! Credits were debited at admission, never here, so re-running a chunk
//! whose commit failed performs no double charge. After a successful
//! commit, each credential that entered FAILED gets its compensating
//! refund; the ledger guarantees at most one refund per credential even if
//! a crash between commit and refund forces a retry by hand.

use std::sync::Arc;

use soulmint_core::{CredentialId, IssuerId};
use soulmint_ledger::{CreditLedger, LedgerError};
use soulmint_registry::{Credential, CredentialRegistry, RegistryError, StagedUpdate};
use soulmint_relay::{ChainRelayer, StorageUploader};

use crate::scheduler::EngineConfig;

/// Counters from one pipeline pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Queued credentials examined.
    pub scanned: usize,
    /// Credentials advanced to PENDING.
    pub advanced: usize,
    /// Credentials that entered FAILED.
    pub failed: usize,
    /// Compensating refunds issued.
    pub refunded: usize,
    /// Chunks committed.
    pub chunks: usize,
}

/// The batch worker that turns QUEUED credentials into submitted mints.
pub struct MintPipeline {
    registry: Arc<CredentialRegistry>,
    ledger: Arc<CreditLedger>,
    uploader: Arc<dyn StorageUploader>,
    relayer: Arc<dyn ChainRelayer>,
    config: EngineConfig,
}

impl MintPipeline {
    /// Assemble a pipeline over the shared stores and capabilities.
    pub fn new(
        registry: Arc<CredentialRegistry>,
        ledger: Arc<CreditLedger>,
        uploader: Arc<dyn StorageUploader>,
        relayer: Arc<dyn ChainRelayer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            uploader,
            relayer,
            config,
        }
    }

    /// Run one full pass over the queue.
    ///
    /// A chunk commit failure aborts the pass; the staged work for that
    /// chunk is discarded and the rows are picked up again next pass.
    pub async fn run_once(&self) -> Result<PipelineReport, RegistryError> {
        let mut report = PipelineReport::default();
        let mut cursor = None;

        loop {
            let (chunk, next) = self.registry.page_queued(cursor, self.config.batch_size);
            if chunk.is_empty() {
                break;
            }

            let mut staged = Vec::with_capacity(chunk.len());
            let mut owners: Vec<(CredentialId, IssuerId)> = Vec::new();
            for credential in &chunk {
                report.scanned += 1;
                let update = self.process_one(credential).await;
                match &update {
                    StagedUpdate::ToPending { .. } => report.advanced += 1,
                    StagedUpdate::ToFailed { .. } => {
                        report.failed += 1;
                        owners.push((credential.id, credential.issuer));
                    }
                }
                staged.push(update);
            }

            self.registry.commit(staged)?;
            report.chunks += 1;

            for (credential, issuer) in owners {
                if self.compensate(credential, issuer) {
                    report.refunded += 1;
                }
            }

            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        Ok(report)
    }

    /// Process one queued credential: upload its document, then submit the
    /// mint. Any failure stages the credential as FAILED; nothing here
    /// touches the registry.
    async fn process_one(&self, credential: &Credential) -> StagedUpdate {
        let document = credential.metadata.canonical_bytes();
        if document.is_empty() {
            return StagedUpdate::ToFailed {
                id: credential.id,
                storage_ref: None,
                reason: "credential document is empty".to_string(),
            };
        }

        let upload = tokio::time::timeout(
            self.config.call_timeout,
            self.uploader.upload(credential.id, &document),
        )
        .await;
        let storage_ref = match upload {
            Ok(Ok(storage_ref)) => storage_ref,
            Ok(Err(e)) => {
                return StagedUpdate::ToFailed {
                    id: credential.id,
                    storage_ref: None,
                    reason: format!("storage upload failed: {e}"),
                };
            }
            Err(_) => {
                return StagedUpdate::ToFailed {
                    id: credential.id,
                    storage_ref: None,
                    reason: "storage upload timed out".to_string(),
                };
            }
        };

        let submit = tokio::time::timeout(
            self.config.call_timeout,
            self.relayer
                .submit_mint(credential.id, &credential.recipient, &storage_ref),
        )
        .await;
        match submit {
            Ok(Ok(tx_hash)) => StagedUpdate::ToPending {
                id: credential.id,
                storage_ref,
                tx_hash,
            },
            // The upload succeeded, so the storage reference is kept on
            // the failed row for audit.
            Ok(Err(e)) => StagedUpdate::ToFailed {
                id: credential.id,
                storage_ref: Some(storage_ref),
                reason: format!("mint submission failed: {e}"),
            },
            Err(_) => StagedUpdate::ToFailed {
                id: credential.id,
                storage_ref: Some(storage_ref),
                reason: "mint submission timed out".to_string(),
            },
        }
    }

    /// Issue the compensating refund for a credential that entered FAILED.
    fn compensate(&self, credential: CredentialId, issuer: IssuerId) -> bool {
        compensate_failure(&self.ledger, &self.registry, credential, issuer)
    }
}

/// Refund the debit behind a credential that reached FAILED.
///
/// Returns whether a refund row was appended. `AlreadyRefunded` means a
/// previous pass got there first and counts as success; other ledger
/// failures are logged and swallowed so one bad row cannot stall a pass.
/// Shared by the pipeline and the reconciler.
pub(crate) fn compensate_failure(
    ledger: &CreditLedger,
    registry: &CredentialRegistry,
    credential: CredentialId,
    issuer: IssuerId,
) -> bool {
    match ledger.refund(issuer, credential) {
        Ok(tx) => {
            if let Err(e) = registry.record_refund(credential, tx.id) {
                tracing::warn!(
                    credential = %credential,
                    error = %e,
                    "refund issued but not recorded on credential"
                );
            }
            true
        }
        Err(LedgerError::AlreadyRefunded { .. }) => false,
        Err(e) => {
            tracing::warn!(
                credential = %credential,
                issuer = %issuer,
                error = %e,
                "compensating refund failed"
            );
            false
        }
    }
}
