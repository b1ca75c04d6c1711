//! C6: the recurring-job loop plus the ad-hoc jobs C5 enqueues.
//!
//! Structured the way the teacher's `LexeBackgroundProcessor` runs: one
//! spawned task, one `tokio::select!` loop with a `tokio::time::interval`
//! per recurring job, and a shutdown branch. `single_leader` fields are
//! this process's stand-in for the external scheduler-store leader
//! election named in §5 — a single deployment of this monitor is assumed
//! to run at a time, so an in-process guard is enough to stop a job from
//! re-entering itself if one run overruns its own interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pay_common::backoff::{RetrySchedule, WAIT_CONFIRMATION};
use pay_common::domain::audit_log::actions;
use pay_common::domain::{AuditLog, TransactionStatus};
use pay_common::shutdown::ShutdownChannel;
use pay_common::task::PayTask;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::interval;
use tracing::{info, warn};

use crate::cache::BalanceCache;
use crate::chain::ChainClient;
use crate::kms::KmsProvider;
use crate::traits::{AuditStore, TransactionStore, UserStore, WalletStore};
use crate::wallet::WalletCrypto;

const PROCESS_PENDING_INTERVAL: Duration = Duration::from_secs(30);
const MARK_STALE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const REFRESH_ACTIVE_BALANCES_INTERVAL: Duration = Duration::from_secs(5 * 60);
const CHECK_FEE_SOL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const VALIDATE_ENCRYPTIONS_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const LOG_KEY_VERSION_STATS_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const PENDING_BATCH_SIZE: u32 = 50;
const STALE_BATCH_SIZE: u32 = 100;
const STALE_THRESHOLD: chrono::Duration = chrono::Duration::minutes(10);
const ACTIVE_WINDOW: chrono::Duration = chrono::Duration::hours(24);
const ACTIVE_BATCH_SIZE: u32 = 100;
const ACTIVE_WALLET_DELAY: Duration = Duration::from_millis(100);
const FEE_WARNING_THRESHOLD_SOL: &str = "0.01";
const KEY_ROTATION_BATCH_SIZE: u32 = 50;

pub struct Monitor<P> {
    users: Arc<dyn UserStore>,
    wallets: Arc<dyn WalletStore>,
    transactions: Arc<dyn TransactionStore>,
    audit: Arc<dyn AuditStore>,
    chain: Arc<ChainClient>,
    cache: Arc<BalanceCache>,
    wallet_crypto: Arc<WalletCrypto<P>>,
    shutdown: ShutdownChannel,
    /// Woken by C5 as soon as it submits a signature, so a freshly
    /// submitted payment doesn't sit idle for the rest of the poll interval.
    submitted: AsyncMutex<pay_common::notify::Receiver>,
    process_pending_running: AsyncMutex<()>,
    rotate_keys_running: AsyncMutex<()>,
    validate_encryptions_running: AsyncMutex<()>,
}

impl<P: KmsProvider + Send + Sync + 'static> Monitor<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        wallets: Arc<dyn WalletStore>,
        transactions: Arc<dyn TransactionStore>,
        audit: Arc<dyn AuditStore>,
        chain: Arc<ChainClient>,
        cache: Arc<BalanceCache>,
        wallet_crypto: Arc<WalletCrypto<P>>,
        shutdown: ShutdownChannel,
        submitted: pay_common::notify::Receiver,
    ) -> Arc<Self> {
        Arc::new(Self {
            users,
            wallets,
            transactions,
            audit,
            chain,
            cache,
            wallet_crypto,
            shutdown,
            submitted: AsyncMutex::new(submitted),
            process_pending_running: AsyncMutex::new(()),
            rotate_keys_running: AsyncMutex::new(()),
            validate_encryptions_running: AsyncMutex::new(()),
        })
    }

    /// Spawns the single task that drives every recurring job.
    pub fn start(self: &Arc<Self>) -> PayTask<()> {
        let this = Arc::clone(self);
        PayTask::spawn_named("scheduler", async move {
            let mut process_pending_timer = interval(PROCESS_PENDING_INTERVAL);
            let mut mark_stale_timer = interval(MARK_STALE_INTERVAL);
            let mut refresh_balances_timer = interval(REFRESH_ACTIVE_BALANCES_INTERVAL);
            let mut check_fee_sol_timer = interval(CHECK_FEE_SOL_INTERVAL);
            let mut validate_encryptions_timer = interval(VALIDATE_ENCRYPTIONS_INTERVAL);
            let mut log_key_version_timer = interval(LOG_KEY_VERSION_STATS_INTERVAL);

            loop {
                tokio::select! {
                    _ = process_pending_timer.tick() => {
                        if let Err(e) = this.process_pending().await {
                            warn!("process_pending failed: {e:#}");
                        }
                    }
                    _ = async { this.submitted.lock().await.recv().await } => {
                        if let Err(e) = this.process_pending().await {
                            warn!("process_pending failed: {e:#}");
                        }
                    }
                    _ = mark_stale_timer.tick() => {
                        if let Err(e) = this.mark_stale().await {
                            warn!("mark_stale failed: {e:#}");
                        }
                    }
                    _ = refresh_balances_timer.tick() => {
                        if let Err(e) = this.refresh_active_balances().await {
                            warn!("refresh_active_balances failed: {e:#}");
                        }
                    }
                    _ = check_fee_sol_timer.tick() => {
                        if let Err(e) = this.check_fee_sol().await {
                            warn!("check_fee_sol failed: {e:#}");
                        }
                    }
                    _ = validate_encryptions_timer.tick() => {
                        if let Err(e) = this.validate_encryptions().await {
                            warn!("validate_encryptions failed: {e:#}");
                        }
                    }
                    _ = log_key_version_timer.tick() => {
                        if let Err(e) = this.log_key_version_stats().await {
                            warn!("log_key_version_stats failed: {e:#}");
                        }
                    }
                    _ = this.shutdown.recv() => {
                        info!("scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Batch of 50, ordered `created_at` ASC; single-leader within this
    /// process via `process_pending_running`.
    pub async fn process_pending(&self) -> anyhow::Result<()> {
        let Ok(_guard) = self.process_pending_running.try_lock() else {
            return Ok(());
        };
        let now = Utc::now();
        let batch = self.transactions.pending_batch(PENDING_BATCH_SIZE).await?;
        for mut tx in batch {
            let Some(signature) = tx.solana_signature.clone() else {
                if now - tx.created_at > STALE_THRESHOLD {
                    tx.mark_failed("no signature", now)?;
                    self.persist_transition(&tx).await?;
                }
                continue;
            };

            let Some(details) = self.chain.get_tx_details(&signature).await else {
                if now - tx.created_at > STALE_THRESHOLD {
                    tx.mark_failed("unseen on chain", now)?;
                    self.persist_transition(&tx).await?;
                }
                continue;
            };

            if details.is_success {
                tx.solana_slot = Some(details.slot);
                tx.solana_block_time = details.block_time;
                tx.advance(TransactionStatus::Confirmed, now)?;
                self.persist_transition(&tx).await?;
                self.invalidate_transaction_caches(&tx).await?;
            } else {
                tx.mark_failed("chain error", now)?;
                self.persist_transition(&tx).await?;
            }
        }
        Ok(())
    }

    /// Select `Pending|Processing` older than 10m, limit 100; one final
    /// `is_confirmed` check decides Confirmed vs Failed.
    pub async fn mark_stale(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let cutoff = now - STALE_THRESHOLD;
        let batch = self.transactions.stale_batch(cutoff, STALE_BATCH_SIZE).await?;
        for mut tx in batch {
            let confirmed = match &tx.solana_signature {
                Some(signature) => self.chain.is_confirmed(signature).await,
                None => false,
            };
            if confirmed {
                tx.advance(TransactionStatus::Confirmed, now)?;
            } else {
                tx.mark_failed("Transaction timed out", now)?;
            }
            self.persist_transition(&tx).await?;
        }
        Ok(())
    }

    /// Wallets for users active within 24h, cap 100; force-refreshes all
    /// three balances with a ~100ms delay between wallets.
    pub async fn refresh_active_balances(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let users = self.users.active_since(now - ACTIVE_WINDOW, ACTIVE_BATCH_SIZE).await?;
        for user in users {
            let Some(wallet) = self.wallets.find_by_user_id(user.id).await? else {
                continue;
            };
            self.cache.get_all_balances(&wallet.public_key, true).await;
            tokio::time::sleep(ACTIVE_WALLET_DELAY).await;
        }
        Ok(())
    }

    /// Warns (does not fail) on any wallet whose SOL balance is below
    /// 0.01.
    pub async fn check_fee_sol(&self) -> anyhow::Result<()> {
        let threshold: rust_decimal::Decimal = FEE_WARNING_THRESHOLD_SOL.parse().expect("valid decimal literal");
        let wallets = self.wallets.all(u32::MAX, 0).await?;
        for wallet in wallets {
            let balance = self.cache.get_sol_balance(&wallet.public_key, false).await;
            if balance < threshold {
                warn!(wallet_id = %wallet.id, %balance, "wallet SOL balance below fee-coverage threshold");
            }
        }
        Ok(())
    }

    /// Confirms every wallet's blob still decrypts; single concurrent run.
    pub async fn validate_encryptions(&self) -> anyhow::Result<()> {
        let Ok(_guard) = self.validate_encryptions_running.try_lock() else {
            return Ok(());
        };
        let wallets = self.wallets.all(u32::MAX, 0).await?;
        let mut failures = 0u32;
        for wallet in &wallets {
            if !self.wallet_crypto.validate(wallet).await {
                failures += 1;
                warn!(wallet_id = %wallet.id, "wallet failed encryption validation");
            }
        }
        info!(total = wallets.len(), failures, "validate_encryptions complete");
        Ok(())
    }

    /// Emits a histogram of `key_version` across all wallets.
    pub async fn log_key_version_stats(&self) -> anyhow::Result<()> {
        let wallets = self.wallets.all(u32::MAX, 0).await?;
        let mut histogram: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
        for wallet in wallets {
            *histogram.entry(wallet.key_version).or_insert(0) += 1;
        }
        for (key_version, count) in histogram {
            info!(key_version, count, "wallet key_version histogram");
        }
        Ok(())
    }

    /// Ad-hoc: poll `is_confirmed` with the `[10,30,60,120,300]s` schedule
    /// until confirmed, the schedule is exhausted, or `timeout` elapses.
    pub async fn wait_confirmation(&self, transaction_id: uuid::Uuid, timeout: Duration) -> anyhow::Result<bool> {
        self.run_with_schedule(WAIT_CONFIRMATION, timeout, || async {
            let Some(tx) = self.transactions.find_by_id(transaction_id).await? else {
                return Ok(true); // row vanished; nothing left to wait for
            };
            let Some(signature) = &tx.solana_signature else {
                return Ok(false);
            };
            Ok(self.chain.is_confirmed(signature).await)
        })
        .await
    }

    /// Ad-hoc: force-refreshes one wallet's balances. `get_all_balances`
    /// itself never errors (chain lookups fall back to zero), so there is
    /// nothing to retry; the job's "up to 3 retries" policy exists for a
    /// caller-side enqueue mechanism that isn't modeled here.
    pub async fn refresh_wallet_balance(&self, pub_key: &str) -> pay_common::domain::wallet::WalletBalances {
        self.cache.get_all_balances(pub_key, true).await
    }

    /// Ad-hoc: rotates every wallet pinned to `old_version` in batches of
    /// 50, yielding briefly between batches. Single instance at a time,
    /// timeout of 1h enforced by the caller via `tokio::time::timeout`.
    pub async fn rotate_keys(&self, old_version: &str, rng: &mut impl pay_common::rng::Crng) -> anyhow::Result<()> {
        let Ok(_guard) = self.rotate_keys_running.try_lock() else {
            return Ok(());
        };
        let mut offset = 0u32;
        loop {
            let batch = self
                .wallets
                .find_by_key_version(old_version, KEY_ROTATION_BATCH_SIZE, offset)
                .await?;
            if batch.is_empty() {
                break;
            }
            for wallet in &batch {
                match self.wallet_crypto.rotate(rng, wallet).await {
                    Ok(rotated) => {
                        self.wallets.save(&rotated).await?;
                        self.audit
                            .append(
                                AuditLog::new(actions::KEY_ROTATION, "wallet")
                                    .with_entity(wallet.id)
                                    .with_values(
                                        Some(serde_json::json!({ "key_version": wallet.key_version })),
                                        Some(serde_json::json!({ "key_version": rotated.key_version })),
                                    ),
                            )
                            .await?;
                    }
                    Err(e) => {
                        warn!(wallet_id = %wallet.id, error = %e, "key rotation failed, leaving wallet untouched");
                        self.audit
                            .append(AuditLog::new(actions::KEY_ROTATION_FAILED, "wallet").with_entity(wallet.id))
                            .await?;
                    }
                }
            }
            offset += KEY_ROTATION_BATCH_SIZE;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn persist_transition(&self, tx: &pay_common::domain::Transaction) -> anyhow::Result<()> {
        self.transactions
            .compare_and_update_status(tx.id, &[TransactionStatus::Pending, TransactionStatus::Processing], tx)
            .await?;
        self.audit
            .append(AuditLog::new(actions::TRANSACTION_STATUS_UPDATE, "transaction").with_entity(tx.id))
            .await?;
        Ok(())
    }

    async fn invalidate_transaction_caches(&self, tx: &pay_common::domain::Transaction) -> anyhow::Result<()> {
        if let Some(sender_wallet) = self.wallets.find_by_user_id(tx.sender_id).await? {
            self.cache.invalidate(&sender_wallet.public_key, Some(tx.token));
        }
        if let Some(receiver_id) = tx.receiver_id {
            if let Some(receiver_wallet) = self.wallets.find_by_user_id(receiver_id).await? {
                self.cache.invalidate(&receiver_wallet.public_key, Some(tx.token));
            }
        }
        Ok(())
    }

    /// Retries `attempt` against `schedule`'s delays until it returns
    /// `Ok(true)`, the schedule is exhausted, or the overall `timeout`
    /// elapses.
    async fn run_with_schedule<F, Fut>(&self, schedule: RetrySchedule, timeout: Duration, mut attempt: F) -> anyhow::Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<bool>>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut tried = 0usize;
        loop {
            if attempt().await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            let Some(delay) = schedule.delay(tried) else {
                return Ok(false);
            };
            tried += 1;
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn job_intervals_match_the_documented_cadence() {
        assert_eq!(PROCESS_PENDING_INTERVAL, Duration::from_secs(30));
        assert_eq!(MARK_STALE_INTERVAL, Duration::from_secs(300));
        assert_eq!(CHECK_FEE_SOL_INTERVAL, Duration::from_secs(86_400));
        assert_eq!(VALIDATE_ENCRYPTIONS_INTERVAL, Duration::from_secs(604_800));
    }
}
