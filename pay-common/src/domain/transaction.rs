//! The Transaction row and its monotone state machine.
//!
//! ```text
//!               create
//!                 │
//!                 ▼
//!   Pending ──► Processing ──► Confirmed (terminal)
//!      │            │
//!      │            ├──► Failed    (terminal)
//!      │            └──► Cancelled (terminal, operator-initiated)
//!      └── (direct-to-terminal on validation rejection before submit)
//! ```
//! Terminal states never transition further. [`TransactionStatus::advance`]
//! is the single place that enforces this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Token;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Confirmed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Cancelled)
    }

    /// Whether transitioning from `self` to `next` is a legal edge in the
    /// state machine above. Identity transitions are never legal: a
    /// caller that already observed the target state should no-op instead
    /// of calling `advance`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use TransactionStatus::*;
        match (self, next) {
            (Pending, Processing | Failed | Cancelled) => true,
            (Processing, Confirmed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransactionType {
    Transfer,
    Withdrawal,
    Deposit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub idempotency_key: String,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub external_address: Option<String>,
    pub amount: rust_decimal::Decimal,
    pub token: Token,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub solana_signature: Option<String>,
    pub solana_slot: Option<u64>,
    pub solana_block_time: Option<i64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raised by [`Transaction::advance`] when the requested transition is not
/// a legal edge (e.g. re-failing an already-`Confirmed` row).
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("cannot transition transaction from {from:?} to {to:?}")]
pub struct IllegalTransition {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

impl Transaction {
    /// `type = Withdrawal ⇒ external_address ≠ null`;
    /// `type = Transfer ⇒ receiver_id ≠ null`.
    pub fn well_formed(&self) -> bool {
        match self.transaction_type {
            TransactionType::Withdrawal => self.external_address.is_some(),
            TransactionType::Transfer => self.receiver_id.is_some(),
            TransactionType::Deposit => true,
        }
    }

    /// Attempts the given state transition, enforcing monotonicity.
    /// Callers persist via a conditional update (`WHERE status IN (...)`)
    /// so this check mirrors, rather than replaces, the storage-layer
    /// guard.
    pub fn advance(
        &mut self,
        next: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), IllegalTransition> {
        if !self.status.can_advance_to(next) {
            return Err(IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        if next == TransactionStatus::Confirmed {
            self.confirmed_at = Some(now);
        }
        Ok(())
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.error_message = Some(error_message.into());
        self.retry_count += 1;
        self.advance(TransactionStatus::Failed, now)
    }

    /// How long this row has sat since creation, used by `process_pending`
    /// and `mark_stale`'s 10-minute staleness threshold.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use TransactionStatus::*;

    fn sample(status: TransactionStatus) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            idempotency_key: "k-001-aaaaaaaaaaaaaaaa".to_string(),
            sender_id: Uuid::new_v4(),
            receiver_id: Some(Uuid::new_v4()),
            external_address: None,
            amount: rust_decimal::Decimal::new(2500, 2),
            token: Token::Usdc,
            transaction_type: TransactionType::Transfer,
            status,
            solana_signature: None,
            solana_slot: None,
            solana_block_time: None,
            error_code: None,
            error_message: None,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_can_advance_to_processing_failed_or_cancelled() {
        assert!(Pending.can_advance_to(Processing));
        assert!(Pending.can_advance_to(Failed));
        assert!(Pending.can_advance_to(Cancelled));
        assert!(!Pending.can_advance_to(Confirmed));
    }

    #[test]
    fn processing_can_advance_to_any_terminal_state() {
        assert!(Processing.can_advance_to(Confirmed));
        assert!(Processing.can_advance_to(Failed));
        assert!(Processing.can_advance_to(Cancelled));
    }

    #[test]
    fn terminal_states_never_advance_further() {
        for terminal in [Confirmed, Failed, Cancelled] {
            for next in [Pending, Processing, Confirmed, Failed, Cancelled] {
                assert!(!terminal.can_advance_to(next));
            }
        }
    }

    #[test]
    fn advance_rejects_illegal_transition() {
        let mut tx = sample(Confirmed);
        let err = tx.advance(Failed, Utc::now()).unwrap_err();
        assert_eq!(err.from, Confirmed);
        assert_eq!(err.to, Failed);
    }

    #[test]
    fn advance_to_confirmed_sets_confirmed_at() {
        let mut tx = sample(Processing);
        let now = Utc::now();
        tx.advance(Confirmed, now).unwrap();
        assert_eq!(tx.confirmed_at, Some(now));
    }

    #[test]
    fn mark_failed_increments_retry_count() {
        let mut tx = sample(Processing);
        tx.mark_failed("chain error", Utc::now()).unwrap();
        assert_eq!(tx.retry_count, 1);
        assert_eq!(tx.status, Failed);
    }

    #[test]
    fn withdrawal_requires_external_address() {
        let mut tx = sample(Pending);
        tx.transaction_type = TransactionType::Withdrawal;
        tx.receiver_id = None;
        tx.external_address = None;
        assert!(!tx.well_formed());
        tx.external_address = Some("Fg6PaFpo...".to_string());
        assert!(tx.well_formed());
    }

    #[test]
    fn transfer_requires_receiver_id() {
        let mut tx = sample(Pending);
        tx.receiver_id = None;
        assert!(!tx.well_formed());
    }
}
