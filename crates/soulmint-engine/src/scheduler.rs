//! # Worker Scheduling
//!
//! Interval loops driving the pipeline and the reconciler. Each worker is
//! a spawned task that ticks on its own `tokio::time::interval` (missed
//! ticks are skipped, not bursted) and exits when the shared shutdown
//! watch channel flips. A failed pass is logged and retried on the next
//! tick; workers never die on an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use soulmint_core::CreditAmount;

use crate::pipeline::MintPipeline;
use crate::reconciler::ConfirmationReconciler;

/// Tunables for the engine's workers.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Credits debited per admitted mint.
    pub mint_price: CreditAmount,
    /// Maximum credentials per pipeline chunk.
    pub batch_size: usize,
    /// Delay between pipeline passes.
    pub pipeline_interval: Duration,
    /// Delay between reconciler passes.
    pub reconcile_interval: Duration,
    /// Upper bound on any single storage or chain call.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mint_price: CreditAmount::from_credits(1),
            batch_size: 10,
            pipeline_interval: Duration::from_secs(5),
            reconcile_interval: Duration::from_secs(15),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Spawn the pipeline's interval loop. Runs until `shutdown` flips to true.
pub fn spawn_pipeline(
    pipeline: Arc<MintPipeline>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval = ?interval, "mint pipeline started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match pipeline.run_once().await {
                        Ok(report) if report.scanned > 0 => {
                            tracing::info!(
                                scanned = report.scanned,
                                advanced = report.advanced,
                                failed = report.failed,
                                refunded = report.refunded,
                                chunks = report.chunks,
                                "pipeline pass complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "pipeline pass failed, will retry");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("mint pipeline stopping");
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn the reconciler's interval loop. Runs until `shutdown` flips to true.
pub fn spawn_reconciler(
    reconciler: Arc<ConfirmationReconciler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval = ?interval, "confirmation reconciler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = reconciler.run_once().await;
                    if report.scanned > 0 {
                        tracing::info!(
                            scanned = report.scanned,
                            confirmed = report.confirmed,
                            rejected = report.rejected,
                            still_pending = report.still_pending,
                            errors = report.errors,
                            "reconciler pass complete"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("confirmation reconciler stopping");
                        break;
                    }
                }
            }
        }
    })
}
