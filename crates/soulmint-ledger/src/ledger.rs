//! # Credit Ledger Operations
//!
//! The [`CreditLedger`] serializes all balance mutations for one account
//! behind a per-account lock, held only across the in-memory
//! read-check-append sequence — never across an I/O boundary. Accounts are
//! stored in a sharded map behind `Arc`ed cells, so operations on different
//! accounts proceed independently.
//!
//! ## Atomicity
//!
//! `debit` performs its balance check and decrement under the account lock;
//! concurrent debits on the same account serialize, and the loser of a
//! race over the last credits observes the already-decremented balance and
//! fails cleanly with no partial write.
//!
//! `purchase` reserves the payment reference in a ledger-wide uniqueness
//! map while holding the account lock, so a replayed webhook delivery is
//! rejected as a conflict before any row is appended.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;

use soulmint_core::{CreditAmount, CredentialId, IssuerId, PaymentRef, Timestamp, TransactionId};

use crate::account::IssuerAccount;
use crate::transaction::{CreditTransaction, TransactionKind};

/// Errors from credit ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The account does not exist.
    #[error("unknown issuer account: {account}")]
    UnknownAccount {
        /// The account that was referenced.
        account: IssuerId,
    },

    /// The account balance cannot cover the requested debit.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// The amount the debit asked for.
        requested: CreditAmount,
        /// The balance at the time of the check.
        available: CreditAmount,
    },

    /// The payment reference has already funded a purchase.
    #[error("duplicate payment reference: {payment_ref}")]
    DuplicatePayment {
        /// The replayed reference.
        payment_ref: PaymentRef,
    },

    /// A deduct row already exists for this credential.
    #[error("credential {credential} has already been debited")]
    DuplicateDebit {
        /// The credential that was already debited.
        credential: CredentialId,
    },

    /// A refund row already exists for this credential.
    #[error("credential {credential} has already been refunded")]
    AlreadyRefunded {
        /// The credential that was already refunded.
        credential: CredentialId,
    },

    /// No deduct row exists for this credential, so there is nothing to refund.
    #[error("no debit recorded for credential {credential}")]
    MissingDebit {
        /// The credential the refund was requested for.
        credential: CredentialId,
    },

    /// An adjustment would take the balance below zero.
    #[error("adjustment of {delta} would take balance {balance} below zero")]
    AdjustmentBelowZero {
        /// The requested signed delta.
        delta: Decimal,
        /// The balance at the time of the check.
        balance: CreditAmount,
    },

    /// Applying the credit would overflow the balance representation.
    #[error("crediting {amount} would overflow balance {balance}")]
    BalanceOverflow {
        /// The amount that could not be applied.
        amount: CreditAmount,
        /// The balance at the time of the check.
        balance: CreditAmount,
    },
}

/// Mutable state of one account: the cached balance projection plus the
/// authoritative log. Guarded by the cell's mutex as a unit, so the two
/// can never diverge.
#[derive(Debug)]
struct AccountCell {
    account: IssuerAccount,
    log: Vec<CreditTransaction>,
}

/// The credit ledger: per-issuer balances backed by an append-only
/// transaction log.
///
/// Thread-safe; share via `Arc`. All operations are synchronous and hold
/// locks only for in-memory work.
#[derive(Debug, Default)]
pub struct CreditLedger {
    accounts: DashMap<IssuerId, Arc<Mutex<AccountCell>>>,
    /// Ledger-wide payment-reference uniqueness index.
    payment_refs: DashMap<PaymentRef, TransactionId>,
}

impl CreditLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new issuer account with a zero balance.
    pub fn open_account(&self, display_name: impl Into<String>) -> IssuerAccount {
        let account = IssuerAccount::new(display_name);
        self.accounts.insert(
            account.id,
            Arc::new(Mutex::new(AccountCell {
                account: account.clone(),
                log: Vec::new(),
            })),
        );
        tracing::info!(issuer = %account.id, "issuer account opened");
        account
    }

    /// Fetch a snapshot of an account.
    pub fn account(&self, id: IssuerId) -> Option<IssuerAccount> {
        self.cell(id).ok().map(|cell| cell.lock().account.clone())
    }

    /// Current balance of an account.
    pub fn balance(&self, id: IssuerId) -> Result<CreditAmount, LedgerError> {
        Ok(self.cell(id)?.lock().account.balance)
    }

    /// Credit an account from an external payment.
    ///
    /// Idempotency: each payment reference funds at most one purchase. A
    /// second call with the same reference fails with
    /// [`LedgerError::DuplicatePayment`] and appends nothing.
    pub fn purchase(
        &self,
        account: IssuerId,
        amount: CreditAmount,
        payment_ref: PaymentRef,
    ) -> Result<CreditTransaction, LedgerError> {
        let cell = self.cell(account)?;
        let mut state = cell.lock();

        let tx_id = TransactionId::new();
        // Reserve the payment reference while holding the account lock so
        // the reservation and the appended row stay consistent.
        match self.payment_refs.entry(payment_ref.clone()) {
            dashmap::Entry::Occupied(_) => {
                return Err(LedgerError::DuplicatePayment { payment_ref });
            }
            dashmap::Entry::Vacant(slot) => {
                slot.insert(tx_id);
            }
        }

        let new_balance = match state.account.balance.checked_add(amount) {
            Some(balance) => balance,
            None => {
                // Release the reservation so the payment can be retried once
                // the balance has room.
                self.payment_refs.remove(&payment_ref);
                return Err(LedgerError::BalanceOverflow {
                    amount,
                    balance: state.account.balance,
                });
            }
        };

        let tx = CreditTransaction {
            id: tx_id,
            account,
            kind: TransactionKind::Purchase,
            amount,
            adjustment_delta: None,
            balance_after: new_balance,
            payment_ref: Some(payment_ref),
            credential: None,
            created_at: Timestamp::now(),
        };
        state.account.balance = new_balance;
        state.log.push(tx.clone());
        tracing::info!(issuer = %account, amount = %amount, "credits purchased");
        Ok(tx)
    }

    /// Debit an account for a mint admission, tied to the credential being
    /// created.
    ///
    /// The balance check and decrement are one atomic step under the
    /// account lock. A failing debit leaves balance and log unchanged.
    pub fn debit(
        &self,
        account: IssuerId,
        amount: CreditAmount,
        credential: CredentialId,
    ) -> Result<CreditTransaction, LedgerError> {
        let cell = self.cell(account)?;
        let mut state = cell.lock();

        if state.log.iter().any(|tx| {
            tx.kind == TransactionKind::Deduct && tx.credential == Some(credential)
        }) {
            return Err(LedgerError::DuplicateDebit { credential });
        }

        let new_balance = state.account.balance.checked_sub(amount).ok_or(
            LedgerError::InsufficientFunds {
                requested: amount,
                available: state.account.balance,
            },
        )?;

        let tx = CreditTransaction {
            id: TransactionId::new(),
            account,
            kind: TransactionKind::Deduct,
            amount,
            adjustment_delta: None,
            balance_after: new_balance,
            payment_ref: None,
            credential: Some(credential),
            created_at: Timestamp::now(),
        };
        state.account.balance = new_balance;
        state.log.push(tx.clone());
        tracing::debug!(issuer = %account, credential = %credential, amount = %amount, "credits debited");
        Ok(tx)
    }

    /// Refund the original debit for a credential that reached FAILED.
    ///
    /// The refund amount is taken from the recorded deduct row, so it is
    /// always equal in magnitude to the original debit. At most one refund
    /// per credential: a second attempt fails with
    /// [`LedgerError::AlreadyRefunded`], which compensating callers treat
    /// as success.
    pub fn refund(
        &self,
        account: IssuerId,
        credential: CredentialId,
    ) -> Result<CreditTransaction, LedgerError> {
        let cell = self.cell(account)?;
        let mut state = cell.lock();

        let amount = state
            .log
            .iter()
            .find(|tx| tx.kind == TransactionKind::Deduct && tx.credential == Some(credential))
            .map(|tx| tx.amount)
            .ok_or(LedgerError::MissingDebit { credential })?;

        if state.log.iter().any(|tx| {
            tx.kind == TransactionKind::Refund && tx.credential == Some(credential)
        }) {
            return Err(LedgerError::AlreadyRefunded { credential });
        }

        let new_balance =
            state
                .account
                .balance
                .checked_add(amount)
                .ok_or(LedgerError::BalanceOverflow {
                    amount,
                    balance: state.account.balance,
                })?;

        let tx = CreditTransaction {
            id: TransactionId::new(),
            account,
            kind: TransactionKind::Refund,
            amount,
            adjustment_delta: None,
            balance_after: new_balance,
            payment_ref: None,
            credential: Some(credential),
            created_at: Timestamp::now(),
        };
        state.account.balance = new_balance;
        state.log.push(tx.clone());
        tracing::info!(issuer = %account, credential = %credential, amount = %amount, "credits refunded");
        Ok(tx)
    }

    /// Apply a signed administrative correction.
    ///
    /// Still floor-checked: an adjustment that would take the balance below
    /// zero is rejected.
    pub fn adjust(
        &self,
        account: IssuerId,
        delta: Decimal,
    ) -> Result<CreditTransaction, LedgerError> {
        let cell = self.cell(account)?;
        let mut state = cell.lock();

        let current = state.account.balance.as_decimal();
        let next = current
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow {
                amount: CreditAmount::new(delta.abs()).unwrap_or_else(|_| CreditAmount::zero()),
                balance: state.account.balance,
            })?;
        if next.is_sign_negative() {
            return Err(LedgerError::AdjustmentBelowZero {
                delta,
                balance: state.account.balance,
            });
        }
        // Safe: checked non-negative above.
        let new_balance = CreditAmount::new(next).map_err(|_| LedgerError::AdjustmentBelowZero {
            delta,
            balance: state.account.balance,
        })?;
        let magnitude = CreditAmount::new(delta.abs()).unwrap_or_else(|_| CreditAmount::zero());

        let tx = CreditTransaction {
            id: TransactionId::new(),
            account,
            kind: TransactionKind::Adjustment,
            amount: magnitude,
            adjustment_delta: Some(delta),
            balance_after: new_balance,
            payment_ref: None,
            credential: None,
            created_at: Timestamp::now(),
        };
        state.account.balance = new_balance;
        state.log.push(tx.clone());
        tracing::info!(issuer = %account, delta = %delta, "balance adjusted");
        Ok(tx)
    }

    /// The full transaction history of an account, in append order.
    pub fn history(&self, account: IssuerId) -> Result<Vec<CreditTransaction>, LedgerError> {
        Ok(self.cell(account)?.lock().log.clone())
    }

    /// Whether a refund row exists for the credential on this account.
    pub fn has_refund(
        &self,
        account: IssuerId,
        credential: CredentialId,
    ) -> Result<bool, LedgerError> {
        Ok(self.cell(account)?.lock().log.iter().any(|tx| {
            tx.kind == TransactionKind::Refund && tx.credential == Some(credential)
        }))
    }

    /// Replay the transaction log and return the resulting balance.
    ///
    /// Invariant check: this always equals [`Self::balance`]. Every
    /// intermediate sum in the replay is a balance the account actually
    /// held, so the checked fold only errors on a corrupted log.
    pub fn replayed_balance(&self, account: IssuerId) -> Result<Decimal, LedgerError> {
        let cell = self.cell(account)?;
        let state = cell.lock();
        let mut total = Decimal::ZERO;
        for tx in &state.log {
            total = total
                .checked_add(tx.signed_delta())
                .ok_or(LedgerError::BalanceOverflow {
                    amount: tx.amount,
                    balance: state.account.balance,
                })?;
        }
        Ok(total)
    }

    fn cell(&self, id: IssuerId) -> Result<Arc<Mutex<AccountCell>>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::UnknownAccount { account: id })
    }
}
