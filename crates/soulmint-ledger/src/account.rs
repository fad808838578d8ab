//! # Issuer Accounts
//!
//! An issuer account holds a prepaid credit balance. The balance is a
//! cached projection of the account's transaction log — the log is
//! authoritative, and `CreditLedger::replayed_balance` checks the two
//! agree.

use serde::{Deserialize, Serialize};

use soulmint_core::{CreditAmount, IssuerId, Timestamp};

/// An issuer account: identity plus a non-negative credit balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerAccount {
    /// Unique issuer identifier.
    pub id: IssuerId,
    /// Human-readable issuer name.
    pub display_name: String,
    /// Current credit balance (derived from the transaction log).
    pub balance: CreditAmount,
    /// When the account was opened.
    pub created_at: Timestamp,
}

impl IssuerAccount {
    /// Open a new account with a zero balance.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: IssuerId::new(),
            display_name: display_name.into(),
            balance: CreditAmount::zero(),
            created_at: Timestamp::now(),
        }
    }
}
