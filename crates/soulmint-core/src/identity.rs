//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all domain identifiers in the Soulmint stack.
//! These prevent accidental identifier confusion — you cannot pass a
//! `CredentialId` where an `IssuerId` is expected, and a chain transaction
//! hash can never stand in for a permanent-storage reference.
//!
//! ## Validated string identifiers
//!
//! `RecipientAddress` and `TxHash` are chain-format identifiers and are
//! validated at construction (0x-prefixed hex of fixed length). `TokenId`
//! and `PaymentRef` are opaque external identifiers and only require
//! non-emptiness.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for an issuer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuerId(pub Uuid);

/// Unique identifier for a credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialId(pub Uuid);

/// Unique identifier for a credit ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl IssuerId {
    /// Generate a new random issuer identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl CredentialId {
    /// Generate a new random credential identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl TransactionId {
    /// Generate a new random transaction identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IssuerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IssuerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "issuer:{}", self.0)
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "credential:{}", self.0)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "credtx:{}", self.0)
    }
}

// ─── Chain-Format Identifiers ────────────────────────────────────────

/// A chain recipient address (0x-prefixed, 40 hex chars).
///
/// Validated at construction so the minting pipeline never submits a
/// malformed address to the chain relayer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientAddress(String);

impl RecipientAddress {
    /// Parse and validate a recipient address.
    pub fn new(addr: impl Into<String>) -> Result<Self, CoreError> {
        let addr = addr.into();
        if is_prefixed_hex(&addr, 40) {
            Ok(Self(addr))
        } else {
            Err(CoreError::InvalidRecipientAddress(addr))
        }
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chain transaction hash (0x-prefixed, 64 hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Parse and validate a transaction hash.
    pub fn new(hash: impl Into<String>) -> Result<Self, CoreError> {
        let hash = hash.into();
        if is_prefixed_hex(&hash, 64) {
            Ok(Self(hash))
        } else {
            Err(CoreError::InvalidTxHash(hash))
        }
    }

    /// The hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An on-chain token identifier, assigned when a mint is confirmed.
///
/// Opaque — the chain decides the format. Unique among confirmed
/// credentials (enforced by the credential registry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Create a token identifier. Rejects empty strings.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::EmptyTokenId);
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An external payment reference used for idempotent purchase reconciliation.
///
/// Each reference may fund at most one purchase transaction; the ledger
/// rejects replays as conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentRef(String);

impl PaymentRef {
    /// Create a payment reference. Rejects empty strings.
    pub fn new(r: impl Into<String>) -> Result<Self, CoreError> {
        let r = r.into();
        if r.is_empty() {
            return Err(CoreError::EmptyPaymentRef);
        }
        Ok(Self(r))
    }

    /// The reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate that a string is `0x` followed by exactly `hex_len` hex chars.
fn is_prefixed_hex(s: &str, hex_len: usize) -> bool {
    s.len() == hex_len + 2
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_id_display_prefix() {
        let id = IssuerId::new();
        assert!(id.to_string().starts_with("issuer:"));
    }

    #[test]
    fn credential_id_display_prefix() {
        let id = CredentialId::new();
        assert!(id.to_string().starts_with("credential:"));
    }

    #[test]
    fn valid_recipient_addresses() {
        assert!(RecipientAddress::new("0x0000000000000000000000000000000000000000").is_ok());
        assert!(RecipientAddress::new("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_ok());
        assert!(RecipientAddress::new("0xAbCdEf0123456789AbCdEf0123456789AbCdEf01").is_ok());
    }

    #[test]
    fn invalid_recipient_addresses() {
        assert!(RecipientAddress::new("").is_err());
        assert!(RecipientAddress::new("0x").is_err());
        assert!(RecipientAddress::new("0x123").is_err());
        assert!(RecipientAddress::new("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef00").is_err());
        assert!(RecipientAddress::new("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG").is_err());
    }

    #[test]
    fn valid_tx_hash() {
        let h = format!("0x{}", "ab".repeat(32));
        assert!(TxHash::new(h).is_ok());
    }

    #[test]
    fn invalid_tx_hash_wrong_length() {
        assert!(TxHash::new("0xabcd").is_err());
        // 40 hex chars is an address, not a transaction hash.
        assert!(TxHash::new("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_err());
    }

    #[test]
    fn token_id_rejects_empty() {
        assert!(TokenId::new("").is_err());
        assert!(TokenId::new("42").is_ok());
    }

    #[test]
    fn payment_ref_rejects_empty() {
        assert!(PaymentRef::new("").is_err());
        assert!(PaymentRef::new("stripe:pi_123").is_ok());
    }

    #[test]
    fn recipient_address_serde_is_transparent() {
        let addr = RecipientAddress::new("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef\"");
    }
}
