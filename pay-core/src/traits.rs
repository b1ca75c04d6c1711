//! External collaborators the payment engine and scheduler consume but do
//! not own: persistence, rate limiting, and audit logging. Deliberately
//! out of scope per the system's own boundary (ORM/schema ergonomics is a
//! concern for the implementer of these traits, not the core).

use async_trait::async_trait;
use pay_common::domain::{AuditLog, Transaction, TransactionStatus, User, Wallet};
use uuid::Uuid;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_phone(&self, phone_number: &str) -> anyhow::Result<Option<User>>;
    async fn save(&self, user: &User) -> anyhow::Result<()>;
    /// Users active within `window` of `now`, used by `refresh_active_balances`.
    async fn active_since(&self, cutoff: chrono::DateTime<chrono::Utc>, limit: u32) -> anyhow::Result<Vec<User>>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: Uuid) -> anyhow::Result<Option<Wallet>>;
    async fn save(&self, wallet: &Wallet) -> anyhow::Result<()>;
    /// Wallets whose `key_version` matches `old_version`, for `rotate_keys`.
    async fn find_by_key_version(&self, old_version: &str, limit: u32, offset: u32) -> anyhow::Result<Vec<Wallet>>;
    async fn all(&self, limit: u32, offset: u32) -> anyhow::Result<Vec<Wallet>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<Transaction>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Transaction>>;
    async fn insert(&self, transaction: &Transaction) -> anyhow::Result<()>;

    /// Conditional update: must only apply if the persisted row's status is
    /// still one of `expected_from`, enforcing monotone transitions at the
    /// storage layer (§5).
    async fn compare_and_update_status(
        &self,
        id: Uuid,
        expected_from: &[TransactionStatus],
        transaction: &Transaction,
    ) -> anyhow::Result<bool>;

    /// Non-failed, non-cancelled transactions for `sender_id` since `since`,
    /// for limit enforcement.
    async fn sum_since(
        &self,
        sender_id: Uuid,
        since: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<rust_decimal::Decimal>;

    /// Pending transactions ordered by `created_at` ASC, for `process_pending`.
    async fn pending_batch(&self, limit: u32) -> anyhow::Result<Vec<Transaction>>;

    /// Pending or processing transactions older than `cutoff`, for `mark_stale`.
    async fn stale_batch(&self, cutoff: chrono::DateTime<chrono::Utc>, limit: u32) -> anyhow::Result<Vec<Transaction>>;

    async fn history(&self, user_id: Uuid, limit: u32, offset: u32) -> anyhow::Result<Vec<Transaction>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, log: AuditLog) -> anyhow::Result<()>;
}

/// Atomic increment-with-expire rate-limit counters, keyed by
/// `(action, subject)` per §5.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `true` if the call is allowed (and counts against the limit).
    async fn check_and_increment(&self, action: &str, subject: &str) -> anyhow::Result<bool>;
}

/// Backs the `withdrawal_whitelist` table named in the persistence
/// contract (§6.2); consulted only for withdrawals, and only when the
/// deployment has chosen to enforce it.
#[async_trait]
pub trait WithdrawalAllowlist: Send + Sync {
    async fn is_allowed(&self, address: &str) -> anyhow::Result<bool>;
}
