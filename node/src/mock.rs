//! An in-memory backend implementing every `pay-core` collaborator trait,
//! mirroring the teacher's `MockApiClient`: one shared struct standing in
//! for the persistence layer that §1 explicitly leaves out of scope
//! ("ORM/schema ergonomics"). `main.rs` wires this in directly; a real
//! deployment would swap it for a Postgres/Redis-backed implementation
//! behind the same trait boundary.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pay_core::traits::{AuditStore, RateLimiter, TransactionStore, UserStore, WalletStore, WithdrawalAllowlist};
use rust_decimal::Decimal;
use uuid::Uuid;

use pay_common::domain::{AuditLog, Transaction, TransactionStatus, User, Wallet};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    wallets: HashMap<Uuid, Wallet>, // keyed by user_id
    transactions: HashMap<Uuid, Transaction>,
    audit: Vec<AuditLog>,
    rate_counters: HashMap<(String, String), (u32, DateTime<Utc>)>,
}

/// One shared backend implementing every store trait the payment core
/// consumes. Registered once with `Arc::new` and cloned as `Arc<dyn Trait>`
/// into each collaborator slot so every call sees the same data.
pub struct MockBackend {
    state: Mutex<State>,
    rate_limit_per_minute: u32,
    allowlist: Option<Vec<String>>,
}

impl MockBackend {
    pub fn new(rate_limit_per_minute: u32, allowlist: Option<Vec<String>>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            rate_limit_per_minute,
            allowlist,
        }
    }
}

#[async_trait]
impl UserStore for MockBackend {
    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        self.state.lock().unwrap().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn active_since(&self, cutoff: DateTime<Utc>, limit: u32) -> anyhow::Result<Vec<User>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .filter(|u| u.last_login_at.is_some_and(|t| t >= cutoff))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WalletStore for MockBackend {
    async fn find_by_user_id(&self, user_id: Uuid) -> anyhow::Result<Option<Wallet>> {
        Ok(self.state.lock().unwrap().wallets.get(&user_id).cloned())
    }

    async fn save(&self, wallet: &Wallet) -> anyhow::Result<()> {
        self.state.lock().unwrap().wallets.insert(wallet.user_id, wallet.clone());
        Ok(())
    }

    async fn find_by_key_version(&self, old_version: &str, limit: u32, offset: u32) -> anyhow::Result<Vec<Wallet>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .wallets
            .values()
            .filter(|w| w.key_version == old_version)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn all(&self, limit: u32, offset: u32) -> anyhow::Result<Vec<Wallet>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .wallets
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionStore for MockBackend {
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<Transaction>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .values()
            .find(|t| t.idempotency_key == key)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Transaction>> {
        Ok(self.state.lock().unwrap().transactions.get(&id).cloned())
    }

    async fn insert(&self, transaction: &Transaction) -> anyhow::Result<()> {
        self.state.lock().unwrap().transactions.insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn compare_and_update_status(
        &self,
        id: Uuid,
        expected_from: &[TransactionStatus],
        transaction: &Transaction,
    ) -> anyhow::Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.transactions.get(&id) else {
            return Ok(false);
        };
        if !expected_from.contains(&existing.status) {
            return Ok(false);
        }
        state.transactions.insert(id, transaction.clone());
        Ok(true)
    }

    async fn sum_since(&self, sender_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<Decimal> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .values()
            .filter(|t| t.sender_id == sender_id && t.created_at >= since)
            .filter(|t| !matches!(t.status, TransactionStatus::Failed | TransactionStatus::Cancelled))
            .map(|t| t.amount)
            .sum())
    }

    async fn pending_batch(&self, limit: u32) -> anyhow::Result<Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending || t.status == TransactionStatus::Processing)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn stale_batch(&self, cutoff: DateTime<Utc>, limit: u32) -> anyhow::Result<Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .values()
            .filter(|t| {
                matches!(t.status, TransactionStatus::Pending | TransactionStatus::Processing) && t.created_at < cutoff
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn history(&self, user_id: Uuid, limit: u32, offset: u32) -> anyhow::Result<Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        let mut history: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.sender_id == user_id || t.receiver_id == Some(user_id))
            .cloned()
            .collect();
        history.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(history.into_iter().skip(offset as usize).take(limit as usize).collect())
    }
}

#[async_trait]
impl AuditStore for MockBackend {
    async fn append(&self, log: AuditLog) -> anyhow::Result<()> {
        self.state.lock().unwrap().audit.push(log);
        Ok(())
    }
}

/// Fixed one-minute window, reset by elapsed time rather than a wall-clock
/// boundary; adequate for a mock and easy to reason about in tests.
#[async_trait]
impl RateLimiter for MockBackend {
    async fn check_and_increment(&self, action: &str, subject: &str) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        let key = (action.to_string(), subject.to_string());
        let entry = state
            .rate_counters
            .entry(key)
            .or_insert((0, now));
        if now - entry.1 > chrono::Duration::minutes(1) {
            *entry = (0, now);
        }
        if entry.0 >= self.rate_limit_per_minute {
            return Ok(false);
        }
        entry.0 += 1;
        Ok(true)
    }
}

#[async_trait]
impl WithdrawalAllowlist for MockBackend {
    async fn is_allowed(&self, address: &str) -> anyhow::Result<bool> {
        match &self.allowlist {
            Some(allowed) => Ok(allowed.iter().any(|a| a == address)),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_user(phone: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            phone_number: phone.to_string(),
            daily_transfer_limit: Decimal::new(100_000, 2),
            daily_transferred_amount: Decimal::ZERO,
            daily_limit_reset_at: now,
            monthly_transfer_limit: Decimal::new(1_000_000, 2),
            monthly_transferred_amount: Decimal::ZERO,
            monthly_limit_reset_at: now,
            is_active: true,
            is_frozen: false,
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn find_by_phone_matches_saved_user() {
        let backend = MockBackend::new(100, None);
        let user = sample_user("+14155550101");
        UserStore::save(&backend, &user).await.unwrap();

        let found = backend.find_by_phone("+14155550101").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(backend.find_by_phone("+10000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rate_limiter_blocks_after_threshold() {
        let backend = MockBackend::new(2, None);
        assert!(backend.check_and_increment("transfer", "u1").await.unwrap());
        assert!(backend.check_and_increment("transfer", "u1").await.unwrap());
        assert!(!backend.check_and_increment("transfer", "u1").await.unwrap());
        // A different subject has its own counter.
        assert!(backend.check_and_increment("transfer", "u2").await.unwrap());
    }

    #[tokio::test]
    async fn allowlist_defaults_to_permissive_when_unset() {
        let backend = MockBackend::new(100, None);
        assert!(backend.is_allowed("anything").await.unwrap());
    }

    #[tokio::test]
    async fn allowlist_rejects_unknown_addresses_when_configured() {
        let backend = MockBackend::new(100, Some(vec!["Fg6PaFpo".to_string()]));
        assert!(backend.is_allowed("Fg6PaFpo").await.unwrap());
        assert!(!backend.is_allowed("other").await.unwrap());
    }
}
