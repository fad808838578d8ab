//! # Mint Admission
//!
//! Admission is the paid gate in front of the minting queue. A request is
//! validated, the issuer's balance is debited by the mint price, and only
//! then is the credential created in QUEUED. The debit and the queued
//! credential reference each other: the deduct row carries the credential
//! id (generated before the debit), and the credential carries the deduct
//! transaction id, so a later compensating refund can always find its way
//! back.
//!
//! A failed validation or an insufficient balance leaves both the ledger
//! and the registry untouched.

use std::sync::Arc;

use thiserror::Error;

use soulmint_core::{
    CreditAmount, CredentialId, CredentialMetadata, IssuerId, RecipientAddress,
};
use soulmint_ledger::{CreditLedger, LedgerError};
use soulmint_registry::{Credential, CredentialRegistry, CredentialStatus, RegistryError};

/// Errors surfaced by admission and revocation.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The issuer has no account.
    #[error("unknown issuer: {issuer}")]
    UnknownIssuer {
        /// The issuer the request named.
        issuer: IssuerId,
    },

    /// The recipient address is malformed.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The metadata document is not a non-empty JSON object.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The issuer's balance cannot cover the mint price.
    #[error("insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits {
        /// The mint price.
        requested: CreditAmount,
        /// The issuer's balance at the time of the check.
        available: CreditAmount,
    },

    /// The credential does not exist.
    #[error("unknown credential: {credential}")]
    NotFound {
        /// The credential the request named.
        credential: CredentialId,
    },

    /// The credential belongs to a different issuer.
    #[error("credential {credential} is not owned by issuer {issuer}")]
    NotOwner {
        /// The credential the request named.
        credential: CredentialId,
        /// The issuer who asked.
        issuer: IssuerId,
    },

    /// Only CONFIRMED credentials can be revoked.
    #[error("credential is {status}, only CONFIRMED credentials can be revoked")]
    NotRevocable {
        /// The credential's current status.
        status: CredentialStatus,
    },

    /// An unexpected ledger failure.
    #[error(transparent)]
    Ledger(LedgerError),

    /// An unexpected registry failure.
    #[error(transparent)]
    Registry(RegistryError),
}

/// A raw mint request as received from the API surface.
///
/// Fields are unvalidated; [`AdmissionService::mint`] turns them into the
/// typed forms or rejects the request without side effects.
#[derive(Debug, Clone)]
pub struct MintRequest {
    /// Wallet address to mint the soulbound token to.
    pub recipient: String,
    /// Issuer-supplied credential document.
    pub metadata: serde_json::Value,
    /// Issuer's correlation reference, carried through opaquely.
    pub external_ref: Option<String>,
}

/// The admission gate: validates, debits, queues.
#[derive(Debug, Clone)]
pub struct AdmissionService {
    ledger: Arc<CreditLedger>,
    registry: Arc<CredentialRegistry>,
    mint_price: CreditAmount,
}

impl AdmissionService {
    /// Create an admission service charging `mint_price` per credential.
    pub fn new(
        ledger: Arc<CreditLedger>,
        registry: Arc<CredentialRegistry>,
        mint_price: CreditAmount,
    ) -> Self {
        Self {
            ledger,
            registry,
            mint_price,
        }
    }

    /// The per-credential mint price.
    pub fn mint_price(&self) -> CreditAmount {
        self.mint_price
    }

    /// Admit a mint request: validate, debit the mint price, create the
    /// QUEUED credential.
    ///
    /// Validation failures and insufficient balance are synchronous and
    /// leave no trace; once this returns `Ok` the credential is queued and
    /// the debit is recorded.
    pub fn mint(
        &self,
        issuer: IssuerId,
        request: MintRequest,
    ) -> Result<Credential, AdmissionError> {
        let recipient = RecipientAddress::new(&request.recipient)
            .map_err(|e| AdmissionError::InvalidRecipient(e.to_string()))?;
        let metadata = CredentialMetadata::new(request.metadata)
            .map_err(|e| AdmissionError::InvalidMetadata(e.to_string()))?;

        // Generated before the debit so the deduct row can reference it.
        let credential_id = CredentialId::new();

        let debit = self
            .ledger
            .debit(issuer, self.mint_price, credential_id)
            .map_err(|e| match e {
                LedgerError::UnknownAccount { account } => {
                    AdmissionError::UnknownIssuer { issuer: account }
                }
                LedgerError::InsufficientFunds {
                    requested,
                    available,
                } => AdmissionError::InsufficientCredits {
                    requested,
                    available,
                },
                other => AdmissionError::Ledger(other),
            })?;

        let credential = self.registry.create(
            credential_id,
            issuer,
            recipient,
            metadata,
            request.external_ref,
            Some(debit.id),
        );
        tracing::info!(
            credential = %credential.id,
            issuer = %issuer,
            price = %self.mint_price,
            "mint admitted"
        );
        Ok(credential)
    }

    /// Revoke a CONFIRMED credential on behalf of its issuer.
    ///
    /// Revocation is administrative and does not refund: the mint happened.
    pub fn revoke(
        &self,
        issuer: IssuerId,
        credential_id: CredentialId,
    ) -> Result<Credential, AdmissionError> {
        let credential = self
            .registry
            .get(credential_id)
            .ok_or(AdmissionError::NotFound {
                credential: credential_id,
            })?;
        if credential.issuer != issuer {
            return Err(AdmissionError::NotOwner {
                credential: credential_id,
                issuer,
            });
        }

        self.registry.revoke(credential_id).map_err(|e| match e {
            RegistryError::InvalidTransition { from, .. } => {
                AdmissionError::NotRevocable { status: from }
            }
            RegistryError::NotFound { id } => AdmissionError::NotFound { credential: id },
            other => AdmissionError::Registry(other),
        })
    }
}
