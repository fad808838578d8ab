//! # soulmint-core — Foundational Types for the Soulmint Stack
//!
//! This crate is the bedrock of the Soulmint credential-issuance stack. It
//! defines the domain primitives every other crate builds on. It depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `IssuerId`, `CredentialId`,
//!    `TransactionId`, `RecipientAddress`, `TxHash`, `TokenId`, `PaymentRef` —
//!    all newtypes with validated constructors. No bare strings for
//!    identifiers, so a payment reference can never be passed where a chain
//!    transaction hash is expected.
//!
//! 2. **Non-negative amounts by construction.** `CreditAmount` wraps a
//!    decimal that is checked at the boundary; a negative balance cannot be
//!    represented, let alone stored.
//!
//! 3. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision, so credential ordering and audit output
//!    are deterministic across hosts.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `soulmint-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod amount;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use amount::CreditAmount;
pub use error::CoreError;
pub use identity::{
    CredentialId, IssuerId, PaymentRef, RecipientAddress, TokenId, TransactionId, TxHash,
};
pub use metadata::CredentialMetadata;
pub use temporal::Timestamp;
