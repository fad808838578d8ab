//! # Confirmation Reconciler
//!
//! The pipeline leaves credentials in PENDING with a submitted transaction
//! hash; the chain decides their fate asynchronously. The reconciler polls
//! finality for every such credential each pass:
//!
//! - confirmed → CAS to CONFIRMED with the minted token identifier,
//! - rejected → CAS to FAILED and refund the original debit,
//! - still pending or unqueryable → left for the next pass.
//!
//! Passes are idempotent: terminal credentials are never selected, and the
//! refund on rejection is at-most-once in the ledger.

use std::sync::Arc;

use soulmint_core::Timestamp;
use soulmint_ledger::CreditLedger;
use soulmint_registry::{CredentialRegistry, CredentialStatus};
use soulmint_relay::{ChainRelayer, TxFinality};

use crate::pipeline::compensate_failure;
use crate::scheduler::EngineConfig;

/// Counters from one reconciler pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerReport {
    /// Pending credentials examined.
    pub scanned: usize,
    /// Finalized as CONFIRMED.
    pub confirmed: usize,
    /// Finalized as FAILED (chain rejection), refund issued.
    pub rejected: usize,
    /// Still awaiting chain finality.
    pub still_pending: usize,
    /// Finality queries or transitions that errored; retried next pass.
    pub errors: usize,
}

/// The worker that finalizes PENDING credentials against chain state.
pub struct ConfirmationReconciler {
    registry: Arc<CredentialRegistry>,
    ledger: Arc<CreditLedger>,
    relayer: Arc<dyn ChainRelayer>,
    config: EngineConfig,
}

impl ConfirmationReconciler {
    /// Assemble a reconciler over the shared stores and the chain relayer.
    pub fn new(
        registry: Arc<CredentialRegistry>,
        ledger: Arc<CreditLedger>,
        relayer: Arc<dyn ChainRelayer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            relayer,
            config,
        }
    }

    /// Run one reconciliation pass over every PENDING credential that has
    /// a submitted transaction, oldest first.
    ///
    /// Individual failures never abort the pass.
    pub async fn run_once(&self) -> ReconcilerReport {
        let mut report = ReconcilerReport::default();
        let pending = self
            .registry
            .find_by_status(CredentialStatus::Pending, true);

        for credential in pending {
            report.scanned += 1;
            let Some(tx_hash) = credential.tx_hash.clone() else {
                continue;
            };

            let finality = tokio::time::timeout(
                self.config.call_timeout,
                self.relayer.finality(&tx_hash),
            )
            .await;

            match finality {
                Ok(Ok(TxFinality::Confirmed { token_id })) => {
                    match self
                        .registry
                        .confirm(credential.id, token_id, Timestamp::now())
                    {
                        Ok(_) => report.confirmed += 1,
                        Err(e) => {
                            report.errors += 1;
                            tracing::warn!(
                                credential = %credential.id,
                                error = %e,
                                "confirmation transition rejected"
                            );
                        }
                    }
                }
                Ok(Ok(TxFinality::Rejected { reason })) => {
                    match self.registry.fail_pending(credential.id, reason) {
                        Ok(_) => {
                            report.rejected += 1;
                            compensate_failure(
                                &self.ledger,
                                &self.registry,
                                credential.id,
                                credential.issuer,
                            );
                        }
                        Err(e) => {
                            report.errors += 1;
                            tracing::warn!(
                                credential = %credential.id,
                                error = %e,
                                "rejection transition rejected"
                            );
                        }
                    }
                }
                Ok(Ok(TxFinality::Pending)) => report.still_pending += 1,
                Ok(Err(e)) => {
                    report.errors += 1;
                    tracing::warn!(
                        credential = %credential.id,
                        tx_hash = %tx_hash,
                        error = %e,
                        "finality query failed, will retry"
                    );
                }
                Err(_) => {
                    report.errors += 1;
                    tracing::warn!(
                        credential = %credential.id,
                        tx_hash = %tx_hash,
                        "finality query timed out, will retry"
                    );
                }
            }
        }

        report
    }
}
