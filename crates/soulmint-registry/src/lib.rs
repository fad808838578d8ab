//! # soulmint-registry — Credential Store
//!
//! Single source of truth for credential lifecycle state. Admission creates
//! QUEUED credentials here; the minting pipeline advances them to PENDING or
//! FAILED in atomic chunks; the confirmation reconciler finalizes PENDING
//! rows; an administrative path revokes CONFIRMED ones.
//!
//! ## Writer Discipline
//!
//! Each status has exactly one writer targeting it as a source state, and
//! every transition is a compare-and-set: the precondition check ("status is
//! currently X") happens inside the same per-entry lock as the write, so a
//! stale writer loses cleanly instead of clobbering a newer state.

pub mod credential;
pub mod registry;

pub use credential::{Credential, CredentialStatus};
pub use registry::{CredentialRegistry, QueueCursor, RegistryError, StagedUpdate};
