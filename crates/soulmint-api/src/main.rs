//! SoulMint service binary.
//!
//! Wires the in-memory stores, the admission gate, and the background
//! workers together, then serves the HTTP API. All state is in-process —
//! data is lost on restart.
//!
//! Capabilities are selected from the environment: with
//! `SOULMINT_STORAGE_URL` / `SOULMINT_RPC_URL` unset, the mock uploader
//! and relayer are used (development mode; every mint auto-confirms).

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use soulmint_api::state::AppState;
use soulmint_core::CreditAmount;
use soulmint_engine::{
    spawn_pipeline, spawn_reconciler, AdmissionService, ConfirmationReconciler, EngineConfig,
    MintPipeline,
};
use soulmint_ledger::CreditLedger;
use soulmint_registry::CredentialRegistry;
use soulmint_relay::{
    ChainRelayer, EvmRelayConfig, EvmRelayer, HttpStorageUploader, MockChainRelayer,
    MockStorageUploader, StorageUploader,
};

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn engine_config() -> EngineConfig {
    let defaults = EngineConfig::default();
    let mint_price = std::env::var("SOULMINT_MINT_PRICE")
        .ok()
        .and_then(|s| Decimal::from_str(&s).ok())
        .and_then(|d| CreditAmount::new(d).ok())
        .unwrap_or(defaults.mint_price);

    EngineConfig {
        mint_price,
        batch_size: env_parse("SOULMINT_BATCH_SIZE", defaults.batch_size),
        pipeline_interval: Duration::from_secs(env_parse(
            "SOULMINT_PIPELINE_INTERVAL_SECS",
            defaults.pipeline_interval.as_secs(),
        )),
        reconcile_interval: Duration::from_secs(env_parse(
            "SOULMINT_RECONCILE_INTERVAL_SECS",
            defaults.reconcile_interval.as_secs(),
        )),
        call_timeout: Duration::from_secs(env_parse(
            "SOULMINT_CALL_TIMEOUT_SECS",
            defaults.call_timeout.as_secs(),
        )),
    }
}

fn storage_uploader(call_timeout: Duration) -> Arc<dyn StorageUploader> {
    match std::env::var("SOULMINT_STORAGE_URL") {
        Ok(url) => {
            tracing::info!(gateway = %url, "using HTTP storage gateway");
            Arc::new(
                HttpStorageUploader::new(url, call_timeout)
                    .expect("failed to build storage uploader"),
            )
        }
        Err(_) => {
            tracing::warn!("SOULMINT_STORAGE_URL not set — using mock storage uploader");
            Arc::new(MockStorageUploader::new())
        }
    }
}

fn chain_relayer() -> Arc<dyn ChainRelayer> {
    match std::env::var("SOULMINT_RPC_URL") {
        Ok(rpc_url) => {
            let contract = std::env::var("SOULMINT_CONTRACT_ADDRESS")
                .expect("SOULMINT_CONTRACT_ADDRESS required with SOULMINT_RPC_URL");
            let from = std::env::var("SOULMINT_FROM_ADDRESS")
                .expect("SOULMINT_FROM_ADDRESS required with SOULMINT_RPC_URL");
            let chain =
                std::env::var("SOULMINT_CHAIN_NAME").unwrap_or_else(|_| "ethereum".to_string());
            tracing::info!(chain = %chain, rpc = %rpc_url, "using EVM chain relayer");
            Arc::new(
                EvmRelayer::new(EvmRelayConfig::new(rpc_url, contract, from, chain))
                    .expect("failed to build chain relayer"),
            )
        }
        Err(_) => {
            tracing::warn!("SOULMINT_RPC_URL not set — using mock chain relayer");
            Arc::new(MockChainRelayer::new("mock-chain"))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = engine_config();
    let port: u16 = env_parse("SOULMINT_PORT", 8080);

    let ledger = Arc::new(CreditLedger::new());
    let registry = Arc::new(CredentialRegistry::new());
    let uploader = storage_uploader(config.call_timeout);
    let relayer = chain_relayer();

    let admission = AdmissionService::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        config.mint_price,
    );
    let pipeline = Arc::new(MintPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        uploader,
        Arc::clone(&relayer),
        config.clone(),
    ));
    let reconciler = Arc::new(ConfirmationReconciler::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        relayer,
        config.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline_handle = spawn_pipeline(pipeline, config.pipeline_interval, shutdown_rx.clone());
    let reconciler_handle = spawn_reconciler(reconciler, config.reconcile_interval, shutdown_rx);

    let app = soulmint_api::app(AppState::new(ledger, registry, admission));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("soulmint-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = pipeline_handle.await;
    let _ = reconciler_handle.await;
}
