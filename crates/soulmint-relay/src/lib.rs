//! # SoulMint Relay
//!
//! Capability boundaries for the two external systems the minting pipeline
//! talks to: permanent storage and the token chain.
//!
//! ## Architecture
//!
//! Each capability is an async trait with two implementations:
//!
//! - a **mock** with deterministic outputs and scriptable failures, used in
//!   development and tests, and
//! - an **HTTP adapter** that speaks to the real service (a storage gateway
//!   for uploads, JSON-RPC for the chain).
//!
//! Callers hold `Arc<dyn StorageUploader>` / `Arc<dyn ChainRelayer>` and
//! never know which implementation is behind them. Neither adapter holds
//! private keys — transaction signing is delegated to the RPC endpoint's
//! key management.

pub mod chain;
mod retry;
pub mod storage;

pub use chain::{
    ChainError, ChainRelayer, EvmRelayConfig, EvmRelayer, MockChainRelayer, TxFinality,
};
pub use storage::{HttpStorageUploader, MockStorageUploader, StorageError, StorageUploader};
