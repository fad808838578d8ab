//! Shared application state injected into every handler.

use std::sync::Arc;

use soulmint_engine::AdmissionService;
use soulmint_ledger::CreditLedger;
use soulmint_registry::CredentialRegistry;

/// Handles to the shared stores and the admission gate.
///
/// The pipeline and reconciler workers hold their own clones of the same
/// `Arc`s, so handlers and workers observe one consistent state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CreditLedger>,
    pub registry: Arc<CredentialRegistry>,
    pub admission: AdmissionService,
}

impl AppState {
    /// Assemble the state over the shared stores.
    pub fn new(
        ledger: Arc<CreditLedger>,
        registry: Arc<CredentialRegistry>,
        admission: AdmissionService,
    ) -> Self {
        Self {
            ledger,
            registry,
            admission,
        }
    }
}
