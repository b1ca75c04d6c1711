//! The authenticated principal: identified by phone number, subject to
//! daily/monthly transfer limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Normalized E.164 phone number, unique.
    pub phone_number: String,
    pub daily_transfer_limit: rust_decimal::Decimal,
    pub daily_transferred_amount: rust_decimal::Decimal,
    pub daily_limit_reset_at: DateTime<Utc>,
    pub monthly_transfer_limit: rust_decimal::Decimal,
    pub monthly_transferred_amount: rust_decimal::Decimal,
    pub monthly_limit_reset_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_frozen: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A frozen or inactive user must be refused any payment operation.
    pub fn can_transact(&self) -> bool {
        self.is_active && !self.is_frozen
    }

    /// Whether `user.last_login_at` falls in the window `refresh_active_balances`
    /// uses to pick wallets worth warming.
    pub fn active_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.last_login_at
            .is_some_and(|last| now - last <= window)
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn base_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            phone_number: "+14155550101".to_string(),
            daily_transfer_limit: rust_decimal::Decimal::new(100000, 2),
            daily_transferred_amount: rust_decimal::Decimal::ZERO,
            daily_limit_reset_at: now,
            monthly_transfer_limit: rust_decimal::Decimal::new(1000000, 2),
            monthly_transferred_amount: rust_decimal::Decimal::ZERO,
            monthly_limit_reset_at: now,
            is_active: true,
            is_frozen: false,
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn frozen_user_cannot_transact() {
        let mut user = base_user();
        user.is_frozen = true;
        assert!(!user.can_transact());
    }

    #[test]
    fn inactive_user_cannot_transact() {
        let mut user = base_user();
        user.is_active = false;
        assert!(!user.can_transact());
    }

    #[test]
    fn active_within_respects_window() {
        let user = base_user();
        let now = user.last_login_at.unwrap() + Duration::hours(23);
        assert!(user.active_within(now, Duration::hours(24)));
        let later = user.last_login_at.unwrap() + Duration::hours(25);
        assert!(!user.active_within(later, Duration::hours(24)));
    }
}
