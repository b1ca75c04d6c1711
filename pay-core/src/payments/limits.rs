//! Daily/monthly transfer-limit checks (§4.5 step 4). The monthly check is
//! the daily check's twin; both are expressed in terms of one generic
//! `check_limit` so a bug fixed in one doesn't rot the other.

use chrono::{DateTime, Duration, Utc};
use pay_common::error::{PaymentError, PaymentErrorKind};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::traits::TransactionStore;

pub enum LimitWindow {
    Daily,
    Monthly,
}

impl LimitWindow {
    fn window_duration(&self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Monthly => Duration::days(30),
        }
    }

    fn error_kind(&self) -> PaymentErrorKind {
        match self {
            Self::Daily => PaymentErrorKind::DailyLimitExceeded,
            Self::Monthly => PaymentErrorKind::MonthlyLimitExceeded,
        }
    }
}

/// `daily_sum = sum of non-failed, non-cancelled transactions since
/// reset_at - 1d`; fails if `daily_sum + amount > limit`. The monthly check
/// mirrors this with a 30-day window.
pub async fn check_limit(
    transactions: &dyn TransactionStore,
    sender_id: Uuid,
    reset_at: DateTime<Utc>,
    limit: Decimal,
    amount: Decimal,
    window: LimitWindow,
) -> Result<(), PaymentError> {
    let since = reset_at - window.window_duration();
    let sum = transactions
        .sum_since(sender_id, since)
        .await
        .map_err(|e| PaymentError::internal(e.to_string()))?;

    if sum + amount > limit {
        return Err(PaymentError::new(
            window.error_kind(),
            format!("transfer of {amount} would exceed the limit of {limit} (already transferred {sum})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pay_common::domain::{Transaction, TransactionStatus};
    use rust_decimal_macros::dec;

    use super::*;

    struct FixedSum(Mutex<Decimal>);

    #[async_trait]
    impl TransactionStore for FixedSum {
        async fn find_by_idempotency_key(&self, _key: &str) -> anyhow::Result<Option<Transaction>> {
            unimplemented!()
        }
        async fn find_by_id(&self, _id: Uuid) -> anyhow::Result<Option<Transaction>> {
            unimplemented!()
        }
        async fn insert(&self, _transaction: &Transaction) -> anyhow::Result<()> {
            unimplemented!()
        }
        async fn compare_and_update_status(
            &self,
            _id: Uuid,
            _expected_from: &[TransactionStatus],
            _transaction: &Transaction,
        ) -> anyhow::Result<bool> {
            unimplemented!()
        }
        async fn sum_since(&self, _sender_id: Uuid, _since: DateTime<Utc>) -> anyhow::Result<Decimal> {
            Ok(*self.0.lock().unwrap())
        }
        async fn pending_batch(&self, _limit: u32) -> anyhow::Result<Vec<Transaction>> {
            unimplemented!()
        }
        async fn stale_batch(&self, _cutoff: DateTime<Utc>, _limit: u32) -> anyhow::Result<Vec<Transaction>> {
            unimplemented!()
        }
        async fn history(&self, _user_id: Uuid, _limit: u32, _offset: u32) -> anyhow::Result<Vec<Transaction>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn passes_when_under_limit() {
        let store = FixedSum(Mutex::new(dec!(50)));
        let result = check_limit(&store, Uuid::new_v4(), Utc::now(), dec!(100), dec!(25), LimitWindow::Daily).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fails_when_over_limit() {
        let store = FixedSum(Mutex::new(dec!(90)));
        let err = check_limit(&store, Uuid::new_v4(), Utc::now(), dec!(100), dec!(25), LimitWindow::Daily)
            .await
            .unwrap_err();
        assert_eq!(err.kind, PaymentErrorKind::DailyLimitExceeded);
    }

    #[tokio::test]
    async fn monthly_window_uses_monthly_error_kind() {
        let store = FixedSum(Mutex::new(dec!(999)));
        let err = check_limit(&store, Uuid::new_v4(), Utc::now(), dec!(1000), dec!(5), LimitWindow::Monthly)
            .await
            .unwrap_err();
        assert_eq!(err.kind, PaymentErrorKind::MonthlyLimitExceeded);
    }
}
