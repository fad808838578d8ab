//! # SoulMint Engine
//!
//! The issuance machinery behind the API surface:
//!
//! - **Admission** ([`AdmissionService`]) — validates mint requests, debits
//!   the issuer's credit balance, and queues the credential. Admission is
//!   the only place credits are spent.
//! - **Minting pipeline** ([`MintPipeline`]) — a periodic batch worker that
//!   drains the queue: uploads each credential document to permanent
//!   storage, submits the mint transaction, and commits the chunk's status
//!   changes atomically.
//! - **Confirmation reconciler** ([`ConfirmationReconciler`]) — polls the
//!   chain for submitted transactions and finalizes credentials as
//!   confirmed or failed, refunding the original debit on rejection.
//!
//! The pipeline and reconciler are driven by [`scheduler`] interval loops.
//! Both are written for a single worker instance; the registry's atomic
//! chunk commit keeps a misconfigured second instance from corrupting
//! state, but throughput scaling is out of scope.

pub mod admission;
pub mod pipeline;
pub mod reconciler;
pub mod scheduler;

pub use admission::{AdmissionError, AdmissionService, MintRequest};
pub use pipeline::{MintPipeline, PipelineReport};
pub use reconciler::{ConfirmationReconciler, ReconcilerReport};
pub use scheduler::{spawn_pipeline, spawn_reconciler, EngineConfig};
