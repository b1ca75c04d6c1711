//! Component construction and wiring: reads [`pay_common::config::Config`]
//! once at startup and builds every collaborator by hand, replacing a DI
//! container per §9 ("construct instances per configuration, pass
//! explicitly").

use std::sync::Arc;

use anyhow::{bail, Context};
use base64::Engine;
use pay_common::config::{Config, KeyManagementConfig};
use pay_common::shutdown::ShutdownChannel;
use pay_core::cache::BalanceCache;
use pay_core::chain::{ChainClient, TokenMints};
use pay_core::fees::DefaultFeePolicy;
use pay_core::kms::{AwsKmsProvider, AzureKeyVaultProvider, KmsAdapter, LocalDevProvider};
use pay_core::payments::PaymentsEngine;
use pay_core::scheduler::Monitor;
use pay_core::traits::{AuditStore, RateLimiter, TransactionStore, UserStore, WalletStore};
use pay_core::wallet::WalletCrypto;
use solana_sdk::commitment_config::CommitmentConfig;

use crate::command::CommandHandlers;
use crate::kms_provider::AnyKmsProvider;
use crate::mock::MockBackend;

/// The fully-wired node: everything `main.rs` and the HTTP router need.
/// The backing stores are the in-memory mock (`mock.rs`) — ORM/schema
/// ergonomics are explicitly out of scope per §1, so a real
/// Postgres/Redis-backed implementation of the same trait set is left to
/// the deployer.
pub struct AppContext {
    pub handlers: Arc<CommandHandlers<AnyKmsProvider>>,
    pub monitor: Arc<Monitor<AnyKmsProvider>>,
    pub shutdown: ShutdownChannel,
}

async fn build_kms_provider(config: &Config) -> anyhow::Result<AnyKmsProvider> {
    match &config.key_management {
        KeyManagementConfig::Local { local_development_key_b64 } => {
            let raw = base64::engine::general_purpose::STANDARD
                .decode(local_development_key_b64)
                .context("KeyManagement__LocalDevelopmentKey was not valid base64")?;
            let key: [u8; 32] = raw
                .try_into()
                .map_err(|_| anyhow::anyhow!("KeyManagement__LocalDevelopmentKey must decode to exactly 32 bytes"))?;
            Ok(AnyKmsProvider::Local(LocalDevProvider::new(key)))
        }
        KeyManagementConfig::AwsKms { key_id, region } => {
            Ok(AnyKmsProvider::Aws(AwsKmsProvider::from_region(key_id.clone(), region.clone()).await))
        }
        KeyManagementConfig::AzureKeyVault { vault_uri, key_name } => {
            // Key Vault's bearer token and key version aren't part of the
            // double-underscore config surface §6.3 names; acquiring a
            // managed-identity token is an external collaborator's job.
            let access_token = std::env::var("KeyManagement__AzureAccessToken")
                .context("KeyManagement__AzureAccessToken was not set")?;
            let key_version = std::env::var("KeyManagement__AzureKeyVersion").unwrap_or_default();
            Ok(AnyKmsProvider::Azure(AzureKeyVaultProvider::new(
                vault_uri.clone(),
                key_name.clone(),
                key_version,
                access_token,
            )))
        }
    }
}

fn build_commitment(config: &Config) -> anyhow::Result<CommitmentConfig> {
    match config.solana.commitment.as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => bail!("Solana__Commitment must be 'processed', 'confirmed', or 'finalized', got '{other}'"),
    }
}

fn build_token_mints() -> TokenMints {
    // §6.2's `system_settings` table carries mint overrides in a real
    // deployment; the mainnet defaults are a reasonable starting point for
    // every cluster this core is pointed at during development.
    TokenMints::mainnet()
}

pub async fn build(config: Config) -> anyhow::Result<AppContext> {
    let kms_provider = build_kms_provider(&config).await?;
    let chain = ChainClient::new(config.solana.rpc_url.clone(), build_commitment(&config)?, build_token_mints());
    let backend = MockBackend::new(config.rate_limit.payments_per_minute, None);
    let (handlers, monitor, shutdown) = wire(kms_provider, chain, backend);
    Ok(AppContext {
        handlers: Arc::new(handlers),
        monitor,
        shutdown,
    })
}

/// Shared by `build` and the integration-test harness: everything past
/// "the three collaborators exist" is identical regardless of where they
/// came from.
fn wire(
    kms_provider: AnyKmsProvider,
    chain: ChainClient,
    backend: MockBackend,
) -> (CommandHandlers<AnyKmsProvider>, Arc<Monitor<AnyKmsProvider>>, ShutdownChannel) {
    let wallet_crypto = Arc::new(WalletCrypto::new(KmsAdapter::new(kms_provider)));
    let chain = Arc::new(chain);
    let cache = Arc::new(BalanceCache::new(chain.clone()));
    let backend = Arc::new(backend);

    let users: Arc<dyn UserStore> = backend.clone();
    let wallets: Arc<dyn WalletStore> = backend.clone();
    let transactions: Arc<dyn TransactionStore> = backend.clone();
    let audit: Arc<dyn AuditStore> = backend.clone();
    let rate_limiter: Arc<dyn RateLimiter> = backend.clone();

    let (submitted_tx, submitted_rx) = pay_common::notify::channel();

    let engine = Arc::new(PaymentsEngine::new(
        users.clone(),
        wallets.clone(),
        transactions.clone(),
        audit.clone(),
        rate_limiter,
        chain.clone(),
        cache.clone(),
        wallet_crypto.clone(),
        Arc::new(DefaultFeePolicy),
        None,
        submitted_tx,
    ));

    let handlers = CommandHandlers::new(
        users.clone(),
        wallets.clone(),
        transactions.clone(),
        audit.clone(),
        cache.clone(),
        wallet_crypto.clone(),
        engine,
    );

    let shutdown = ShutdownChannel::new();
    let monitor = Monitor::new(
        users,
        wallets,
        transactions,
        audit,
        chain,
        cache,
        wallet_crypto,
        shutdown.clone(),
        submitted_rx,
    );

    (handlers, monitor, shutdown)
}

/// A fully-wired `CommandHandlers` backed by the in-memory store and a
/// `LocalDevProvider`, for integration tests that drive the HTTP router
/// without a live chain RPC or KMS endpoint.
pub fn build_for_test() -> CommandHandlers<AnyKmsProvider> {
    let kms_provider = AnyKmsProvider::Local(LocalDevProvider::new([7u8; 32]));
    let chain = ChainClient::new("http://localhost:8899", CommitmentConfig::confirmed(), TokenMints::mainnet());
    let backend = MockBackend::new(1000, None);
    wire(kms_provider, chain, backend).0
}
