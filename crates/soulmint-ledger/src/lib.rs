//! # soulmint-ledger — Credit Ledger
//!
//! Owns per-issuer credit balances and the append-only transaction log that
//! backs them. Every balance change flows through exactly one of the four
//! operations on [`CreditLedger`] (`purchase`, `debit`, `refund`, `adjust`);
//! pipeline code never mutates a balance directly.
//!
//! ## Invariants
//!
//! - The transaction log is append-only: rows are created once and never
//!   updated or deleted.
//! - An account's balance always equals the fold of the signed deltas of its
//!   log (`replayed_balance`).
//! - Balances never go negative; a failing debit leaves both balance and log
//!   untouched.
//! - At most one non-refunded `DEDUCT` and at most one `REFUND` row exist
//!   per credential.
//! - A payment reference funds at most one `PURCHASE` row; replays are
//!   conflicts, not silent no-ops.

pub mod account;
pub mod ledger;
pub mod transaction;

pub use account::IssuerAccount;
pub use ledger::{CreditLedger, LedgerError};
pub use transaction::{CreditTransaction, TransactionKind};
