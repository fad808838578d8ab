//! # Chain Relay
//!
//! Submits soulbound mint transactions and reports their finality.
//!
//! ## How It Works
//!
//! 1. [`ChainRelayer::submit_mint`] calls the token contract's
//!    `safeMint(address,string)` function via `eth_sendTransaction`. The
//!    JSON-RPC endpoint handles transaction signing — the relayer does not
//!    hold private keys.
//! 2. [`ChainRelayer::finality`] uses `eth_getTransactionReceipt` and
//!    compares the current block height against the transaction's block to
//!    decide whether the mint is confirmed. The minted token identifier is
//!    read from the receipt's Transfer event.
//!
//! A submitted transaction is in exactly one of three terminal-or-waiting
//! states: still pending, confirmed with a token identifier, or rejected.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;

use soulmint_core::{CredentialId, RecipientAddress, TokenId, TxHash};

/// Errors from chain relay operations.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The chain endpoint is unreachable or returned a transport error.
    #[error("chain unavailable: {chain}: {reason}")]
    Unavailable {
        /// Human-readable chain name.
        chain: String,
        /// Transport-level detail.
        reason: String,
    },

    /// The RPC endpoint refused the mint submission.
    #[error("mint submission failed on {chain}: {reason}")]
    SubmissionFailed {
        /// Human-readable chain name.
        chain: String,
        /// Endpoint-reported reason.
        reason: String,
    },

    /// The transaction hash is not known to the chain.
    #[error("unknown transaction: {tx_hash}")]
    UnknownTransaction {
        /// The hash that was queried.
        tx_hash: TxHash,
    },

    /// The RPC response could not be interpreted.
    #[error("malformed chain response: {0}")]
    MalformedResponse(String),
}

/// Finality of a submitted mint transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxFinality {
    /// Not yet included, or included without enough confirmations.
    Pending,
    /// Durably included; the token identifier has been assigned.
    Confirmed {
        /// The minted token's on-chain identifier.
        token_id: TokenId,
    },
    /// Dropped or reverted. The mint will never land.
    Rejected {
        /// Why the chain rejected it.
        reason: String,
    },
}

/// Capability for submitting mint transactions and checking their finality.
///
/// `submit_mint` returning `Ok` means the transaction was accepted into the
/// endpoint's mempool, not that the mint succeeded — callers must poll
/// `finality` to learn the outcome.
#[async_trait]
pub trait ChainRelayer: Send + Sync {
    /// Submit a soulbound mint for `recipient` referencing the uploaded
    /// document at `storage_ref`. Returns the transaction hash.
    async fn submit_mint(
        &self,
        credential: CredentialId,
        recipient: &RecipientAddress,
        storage_ref: &str,
    ) -> Result<TxHash, ChainError>;

    /// Report the current finality of a previously submitted transaction.
    async fn finality(&self, tx_hash: &TxHash) -> Result<TxFinality, ChainError>;

    /// Human-readable name of the target chain.
    fn chain_name(&self) -> &str;
}

// ─── Mock Relayer ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MockChainState {
    nonce: u64,
    tokens: HashMap<TxHash, TokenId>,
    overrides: HashMap<TxHash, TxFinality>,
    submit_failure: Option<String>,
}

/// Mock chain relayer for development and testing.
///
/// Transaction hashes are deterministic (derived from the chain name and a
/// submission counter) and every submission is assigned a sequential token
/// identifier. By default `finality` reports `Confirmed` immediately;
/// individual transactions can be scripted to stay pending or to be
/// rejected, and submissions can be made to fail outright.
///
/// ## Warning
///
/// This implementation mints nothing. It is suitable only for development
/// and tests.
#[derive(Debug)]
pub struct MockChainRelayer {
    chain_name: String,
    state: Mutex<MockChainState>,
}

impl MockChainRelayer {
    /// Create a mock relayer for a named chain.
    pub fn new(chain_name: impl Into<String>) -> Self {
        Self {
            chain_name: chain_name.into(),
            state: Mutex::new(MockChainState::default()),
        }
    }

    /// Make subsequent submissions fail with `reason`.
    pub fn fail_submissions(&self, reason: impl Into<String>) {
        self.state.lock().submit_failure = Some(reason.into());
    }

    /// Resume accepting submissions.
    pub fn recover(&self) {
        self.state.lock().submit_failure = None;
    }

    /// Script a transaction to report `Pending` until resolved.
    pub fn hold(&self, tx_hash: &TxHash) {
        self.state
            .lock()
            .overrides
            .insert(tx_hash.clone(), TxFinality::Pending);
    }

    /// Script a transaction to report `Rejected`.
    pub fn reject(&self, tx_hash: &TxHash, reason: impl Into<String>) {
        self.state.lock().overrides.insert(
            tx_hash.clone(),
            TxFinality::Rejected {
                reason: reason.into(),
            },
        );
    }

    /// Clear any script for a transaction, returning it to the default
    /// immediately-confirmed behavior.
    pub fn resolve(&self, tx_hash: &TxHash) {
        self.state.lock().overrides.remove(tx_hash);
    }

    /// Number of submissions accepted so far.
    pub fn submissions(&self) -> u64 {
        self.state.lock().nonce
    }
}

#[async_trait]
impl ChainRelayer for MockChainRelayer {
    async fn submit_mint(
        &self,
        _credential: CredentialId,
        recipient: &RecipientAddress,
        _storage_ref: &str,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.submit_failure {
            return Err(ChainError::SubmissionFailed {
                chain: self.chain_name.clone(),
                reason: reason.clone(),
            });
        }

        state.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.chain_name.as_bytes());
        hasher.update(state.nonce.to_be_bytes());
        hasher.update(recipient.as_str().as_bytes());
        let tx_hash = TxHash::new(format!("0x{:x}", hasher.finalize()))
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;

        let token_id = TokenId::new(state.nonce.to_string())
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        state.tokens.insert(tx_hash.clone(), token_id);
        Ok(tx_hash)
    }

    async fn finality(&self, tx_hash: &TxHash) -> Result<TxFinality, ChainError> {
        let state = self.state.lock();
        if let Some(scripted) = state.overrides.get(tx_hash) {
            return Ok(scripted.clone());
        }
        let token_id = state
            .tokens
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::UnknownTransaction {
                tx_hash: tx_hash.clone(),
            })?;
        Ok(TxFinality::Confirmed { token_id })
    }

    fn chain_name(&self) -> &str {
        &self.chain_name
    }
}

// ─── EVM JSON-RPC Relayer ───────────────────────────────────────────────

/// Configuration for the EVM JSON-RPC relayer.
#[derive(Debug, Clone)]
pub struct EvmRelayConfig {
    /// JSON-RPC endpoint URL (must be HTTPS in production).
    pub rpc_url: String,
    /// Token contract address (0x-prefixed, 40 hex chars).
    pub contract_address: String,
    /// Sender address whose transactions are signed by the RPC provider.
    pub from_address: String,
    /// Human-readable chain name (e.g., "ethereum", "polygon").
    pub chain_name: String,
    /// Number of block confirmations required to report `Confirmed`.
    pub confirmations_required: u64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Transport-failure retries per RPC call, after the initial attempt.
    pub rpc_retries: u32,
}

impl EvmRelayConfig {
    /// Create a configuration with defaults: 12 confirmations, 30s timeout,
    /// 3 transport retries.
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: impl Into<String>,
        from_address: impl Into<String>,
        chain_name: impl Into<String>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            from_address: from_address.into(),
            chain_name: chain_name.into(),
            confirmations_required: 12,
            timeout_secs: 30,
            rpc_retries: 3,
        }
    }

    /// Set the confirmation depth.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations_required = confirmations;
        self
    }
}

/// 4-byte function selector for `safeMint(address,string)`.
const SAFE_MINT_SELECTOR: &str = "d204c45e";

/// ERC-721 Transfer event signature topic, used to locate the minted token
/// identifier in the transaction receipt.
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Chain relayer that mints via an EVM JSON-RPC endpoint.
///
/// ## Contract Interface
///
/// The token contract must expose:
/// ```solidity
/// function safeMint(address to, string uri) external;
/// ```
///
/// The minted token identifier is recovered from the Transfer event's
/// third indexed topic in the transaction receipt.
#[derive(Debug)]
pub struct EvmRelayer {
    client: reqwest::Client,
    config: EvmRelayConfig,
    retry: crate::retry::RetryPolicy,
}

impl EvmRelayer {
    /// Create a relayer from configuration.
    pub fn new(config: EvmRelayConfig) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::Unavailable {
                chain: config.chain_name.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        if !is_valid_eth_address(&config.contract_address) {
            return Err(ChainError::SubmissionFailed {
                chain: config.chain_name.clone(),
                reason: format!("invalid contract address: {}", config.contract_address),
            });
        }
        if !is_valid_eth_address(&config.from_address) {
            return Err(ChainError::SubmissionFailed {
                chain: config.chain_name.clone(),
                reason: format!("invalid from address: {}", config.from_address),
            });
        }

        let retry = crate::retry::RetryPolicy::with_retries(config.rpc_retries);
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Send a JSON-RPC request and return the result field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ChainError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .retry
            .send(|| self.client.post(&self.config.rpc_url).json(&body).send())
            .await
            .map_err(|e| ChainError::Unavailable {
                chain: self.config.chain_name.clone(),
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !resp.status().is_success() {
            return Err(ChainError::Unavailable {
                chain: self.config.chain_name.clone(),
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let json: serde_json::Value =
            resp.json().await.map_err(|e| ChainError::Unavailable {
                chain: self.config.chain_name.clone(),
                reason: format!("invalid JSON response: {e}"),
            })?;

        if let Some(error) = json.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(ChainError::SubmissionFailed {
                chain: self.config.chain_name.clone(),
                reason: msg.to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| {
                ChainError::MalformedResponse(
                    "JSON-RPC response missing 'result' field".to_string(),
                )
            })
    }

    /// Encode the `safeMint(address,string)` calldata.
    fn encode_calldata(recipient: &RecipientAddress, storage_ref: &str) -> String {
        // ABI: selector, left-padded address, offset of the string (0x40),
        // then string length and right-padded UTF-8 bytes.
        let addr = recipient.as_str().trim_start_matches("0x").to_lowercase();
        let uri = storage_ref.as_bytes();
        let mut uri_hex = String::with_capacity(uri.len() * 2);
        for byte in uri {
            uri_hex.push_str(&format!("{byte:02x}"));
        }
        let padded_len = uri.len().div_ceil(32) * 32;
        uri_hex.push_str(&"0".repeat((padded_len - uri.len()) * 2));

        format!(
            "0x{SAFE_MINT_SELECTOR}{:0>64}{:064x}{:064x}{uri_hex}",
            addr,
            64,
            uri.len()
        )
    }

    /// Read the minted token identifier from a receipt's Transfer event.
    fn token_id_from_receipt(receipt: &serde_json::Value) -> Result<TokenId, ChainError> {
        let logs = receipt
            .get("logs")
            .and_then(|l| l.as_array())
            .ok_or_else(|| {
                ChainError::MalformedResponse("receipt missing 'logs' field".to_string())
            })?;

        for log in logs {
            let topics = log.get("topics").and_then(|t| t.as_array());
            let Some(topics) = topics else { continue };
            if topics.first().and_then(|t| t.as_str()) != Some(TRANSFER_TOPIC) {
                continue;
            }
            // Transfer(address from, address to, uint256 tokenId): the
            // token identifier is the third indexed topic.
            let raw = topics
                .get(3)
                .and_then(|t| t.as_str())
                .ok_or_else(|| {
                    ChainError::MalformedResponse(
                        "Transfer event missing tokenId topic".to_string(),
                    )
                })?;
            let hex = raw.trim_start_matches("0x").trim_start_matches('0');
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ChainError::MalformedResponse(format!(
                    "unparseable tokenId topic: {raw}"
                )));
            }
            // Sequential ids fit a machine word and read best in decimal;
            // hash-derived ids use the full uint256 range and stay hex.
            let rendered = if hex.is_empty() {
                "0".to_string()
            } else if hex.len() <= 32 {
                u128::from_str_radix(hex, 16)
                    .map_err(|e| {
                        ChainError::MalformedResponse(format!("unparseable tokenId topic: {e}"))
                    })?
                    .to_string()
            } else {
                format!("0x{hex}")
            };
            return TokenId::new(rendered)
                .map_err(|e| ChainError::MalformedResponse(e.to_string()));
        }

        Err(ChainError::MalformedResponse(
            "receipt contains no Transfer event".to_string(),
        ))
    }
}

#[async_trait]
impl ChainRelayer for EvmRelayer {
    async fn submit_mint(
        &self,
        credential: CredentialId,
        recipient: &RecipientAddress,
        storage_ref: &str,
    ) -> Result<TxHash, ChainError> {
        let data = Self::encode_calldata(recipient, storage_ref);
        let tx = serde_json::json!({
            "from": self.config.from_address,
            "to": self.config.contract_address,
            "data": data,
        });

        let result = self
            .rpc_call("eth_sendTransaction", serde_json::json!([tx]))
            .await?;

        let raw = result.as_str().ok_or_else(|| {
            ChainError::MalformedResponse(
                "eth_sendTransaction returned non-string result".to_string(),
            )
        })?;

        let tx_hash =
            TxHash::new(raw).map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        tracing::info!(
            credential = %credential,
            tx_hash = %tx_hash,
            chain = %self.config.chain_name,
            "mint transaction submitted"
        );
        Ok(tx_hash)
    }

    async fn finality(&self, tx_hash: &TxHash) -> Result<TxFinality, ChainError> {
        let receipt = self
            .rpc_call(
                "eth_getTransactionReceipt",
                serde_json::json!([tx_hash.as_str()]),
            )
            .await?;

        // Null receipt means the transaction is not yet mined.
        if receipt.is_null() {
            return Ok(TxFinality::Pending);
        }

        let status_hex = receipt
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("0x0");
        if status_hex == "0x0" {
            return Ok(TxFinality::Rejected {
                reason: "transaction reverted".to_string(),
            });
        }

        let tx_block = receipt
            .get("blockNumber")
            .and_then(|b| b.as_str())
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);

        let current_block_val = self
            .rpc_call("eth_blockNumber", serde_json::json!([]))
            .await?;
        let current_block = current_block_val
            .as_str()
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);

        if current_block.saturating_sub(tx_block) < self.config.confirmations_required {
            return Ok(TxFinality::Pending);
        }

        let token_id = Self::token_id_from_receipt(&receipt)?;
        Ok(TxFinality::Confirmed { token_id })
    }

    fn chain_name(&self) -> &str {
        &self.config.chain_name
    }
}

/// Validate that a string is a well-formed Ethereum address (0x + 40 hex chars).
fn is_valid_eth_address(addr: &str) -> bool {
    addr.len() == 42
        && addr.starts_with("0x")
        && addr[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> RecipientAddress {
        RecipientAddress::new("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").unwrap()
    }

    #[tokio::test]
    async fn mock_submit_produces_valid_tx_hashes() {
        let relayer = MockChainRelayer::new("mock-eth");
        let a = relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://one")
            .await
            .unwrap();
        let b = relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://two")
            .await
            .unwrap();
        assert_ne!(a, b, "each submission gets its own hash");
        assert_eq!(relayer.submissions(), 2);
    }

    #[tokio::test]
    async fn mock_confirms_with_sequential_token_ids() {
        let relayer = MockChainRelayer::new("mock-eth");
        let tx = relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://doc")
            .await
            .unwrap();

        let finality = relayer.finality(&tx).await.unwrap();
        assert_eq!(
            finality,
            TxFinality::Confirmed {
                token_id: TokenId::new("1").unwrap()
            }
        );
    }

    #[tokio::test]
    async fn mock_scripted_hold_and_resolve() {
        let relayer = MockChainRelayer::new("mock-eth");
        let tx = relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://doc")
            .await
            .unwrap();

        relayer.hold(&tx);
        assert_eq!(relayer.finality(&tx).await.unwrap(), TxFinality::Pending);

        relayer.resolve(&tx);
        assert!(matches!(
            relayer.finality(&tx).await.unwrap(),
            TxFinality::Confirmed { .. }
        ));
    }

    #[tokio::test]
    async fn mock_scripted_rejection() {
        let relayer = MockChainRelayer::new("mock-eth");
        let tx = relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://doc")
            .await
            .unwrap();

        relayer.reject(&tx, "out of gas");
        assert_eq!(
            relayer.finality(&tx).await.unwrap(),
            TxFinality::Rejected {
                reason: "out of gas".to_string()
            }
        );
    }

    #[tokio::test]
    async fn mock_submission_failure_switch() {
        let relayer = MockChainRelayer::new("mock-eth");
        relayer.fail_submissions("mempool full");

        let err = relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://doc")
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::SubmissionFailed { .. }));

        relayer.recover();
        assert!(relayer
            .submit_mint(CredentialId::new(), &recipient(), "ar://doc")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn mock_unknown_transaction() {
        let relayer = MockChainRelayer::new("mock-eth");
        let unknown = TxHash::new(format!("0x{:064x}", 7u8)).unwrap();
        let err = relayer.finality(&unknown).await.unwrap_err();
        assert!(matches!(err, ChainError::UnknownTransaction { .. }));
    }

    #[test]
    fn encode_calldata_layout() {
        let calldata = EvmRelayer::encode_calldata(&recipient(), "ar://abc");

        assert!(calldata.starts_with(&format!("0x{SAFE_MINT_SELECTOR}")));
        // selector + 3 head words + 1 padded data word
        assert_eq!(calldata.len(), 2 + 8 + 64 * 4);
        // address is left-padded into the first word
        assert!(calldata[10..74].ends_with("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"));
        // string offset is 0x40
        assert!(calldata[74..138].ends_with("40"));
        // string length is 8
        assert!(calldata[138..202].ends_with("8"));
    }

    #[test]
    fn token_id_from_receipt_reads_transfer_topic() {
        let receipt = serde_json::json!({
            "status": "0x1",
            "logs": [{
                "topics": [
                    TRANSFER_TOPIC,
                    "0x0000000000000000000000000000000000000000000000000000000000000000",
                    "0x000000000000000000000000deadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
                    "0x000000000000000000000000000000000000000000000000000000000000002a"
                ]
            }]
        });
        let token_id = EvmRelayer::token_id_from_receipt(&receipt).unwrap();
        assert_eq!(token_id, TokenId::new("42").unwrap());
    }

    #[test]
    fn token_id_from_receipt_keeps_uint256_width_ids() {
        // Hash-derived token ids use all 256 bits and cannot be narrowed.
        let receipt = serde_json::json!({
            "status": "0x1",
            "logs": [{
                "topics": [
                    TRANSFER_TOPIC,
                    "0x0000000000000000000000000000000000000000000000000000000000000000",
                    "0x000000000000000000000000deadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
                    "0xf00dfeedf00dfeedf00dfeedf00dfeedf00dfeedf00dfeedf00dfeedf00dfeed"
                ]
            }]
        });
        let token_id = EvmRelayer::token_id_from_receipt(&receipt).unwrap();
        assert_eq!(
            token_id,
            TokenId::new("0xf00dfeedf00dfeedf00dfeedf00dfeedf00dfeedf00dfeedf00dfeedf00dfeed")
                .unwrap()
        );
    }

    #[test]
    fn token_id_from_receipt_rejects_junk_topic() {
        let receipt = serde_json::json!({
            "status": "0x1",
            "logs": [{
                "topics": [
                    TRANSFER_TOPIC,
                    "0x0000000000000000000000000000000000000000000000000000000000000000",
                    "0x000000000000000000000000deadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
                    "0xnot-hex"
                ]
            }]
        });
        let err = EvmRelayer::token_id_from_receipt(&receipt).unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));
    }

    #[test]
    fn token_id_from_receipt_without_transfer_event() {
        let receipt = serde_json::json!({"status": "0x1", "logs": []});
        let err = EvmRelayer::token_id_from_receipt(&receipt).unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));
    }

    #[test]
    fn relayer_rejects_invalid_contract_address() {
        let config = EvmRelayConfig::new(
            "https://rpc.example.com",
            "not-an-address",
            "0x0000000000000000000000000000000000000002",
            "ethereum",
        );
        assert!(EvmRelayer::new(config).is_err());
    }

    #[test]
    fn relayer_builds_with_valid_config() {
        let config = EvmRelayConfig::new(
            "https://rpc.example.com",
            "0x0000000000000000000000000000000000000001",
            "0x0000000000000000000000000000000000000002",
            "ethereum",
        )
        .with_confirmations(3);
        let relayer = EvmRelayer::new(config).expect("should build");
        assert_eq!(relayer.chain_name(), "ethereum");
    }
}
