//! The custodial wallet row: a base58 public key plus an opaque,
//! envelope-encrypted blob holding the secret key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Token;

/// `key_algorithm` is fixed at "AES-256-GCM" for every provider.
pub const KEY_ALGORITHM: &str = "AES-256-GCM";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Base58-encoded Ed25519 public key.
    pub public_key: String,
    /// Opaque envelope-encrypted blob; see [`crate::config`]'s blob format.
    pub encrypted_private_key: String,
    /// External key-version identifier returned by the KMS adapter.
    pub key_version: String,
    pub key_algorithm: String,
    pub cached_usdc_balance: Option<Decimal>,
    pub cached_usdt_balance: Option<Decimal>,
    pub balance_last_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn cached_balance(&self, token: Token) -> Option<Decimal> {
        match token {
            Token::Usdc => self.cached_usdc_balance,
            Token::Usdt => self.cached_usdt_balance,
        }
    }
}

/// Point-in-time balances across the tokens this service moves plus the
/// native gas token (SOL), as composed by the balance cache's
/// "all balances" fan-out.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletBalances {
    pub usdc: Decimal,
    pub usdt: Decimal,
    pub sol: Decimal,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cached_balance_picks_the_matching_token() {
        let now = Utc::now();
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            public_key: "11111111111111111111111111111111".to_string(),
            encrypted_private_key: String::new(),
            key_version: "local-v1".to_string(),
            key_algorithm: KEY_ALGORITHM.to_string(),
            cached_usdc_balance: Some(Decimal::new(2500, 2)),
            cached_usdt_balance: None,
            balance_last_updated_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(wallet.cached_balance(Token::Usdc), Some(Decimal::new(2500, 2)));
        assert_eq!(wallet.cached_balance(Token::Usdt), None);
    }
}
