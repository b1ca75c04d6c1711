//! C4: a short-TTL, read-through cache in front of C3.
//!
//! Keys mirror §4.4 exactly (`balance:token:{TOKEN}:{pub}`,
//! `balance:sol:{pub}`) even though this in-process implementation never
//! serializes them to an external cache store — keeping the same key shape
//! makes swapping in a network cache (Redis, per `Redis__ConnectionString`)
//! a change to the backing map only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future;
use pay_common::amount::Token;
use pay_common::domain::wallet::WalletBalances;
use rust_decimal::Decimal;

use crate::chain::ChainClient;

const TOKEN_TTL: Duration = Duration::from_secs(30);
const SOL_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug)]
struct CachedValue {
    balance: Decimal,
    fetched_at: DateTime<Utc>,
}

impl CachedValue {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.fetched_at) < chrono::Duration::from_std(ttl).unwrap_or_default()
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
enum CacheKey {
    Token(Token, String),
    Sol(String),
}

pub struct BalanceCache {
    chain: Arc<ChainClient>,
    entries: Mutex<HashMap<CacheKey, CachedValue>>,
}

impl BalanceCache {
    pub fn new(chain: Arc<ChainClient>) -> Self {
        Self {
            chain,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &CacheKey, ttl: Duration) -> Option<Decimal> {
        let now = Utc::now();
        let entries = self.entries.lock().expect("cache mutex poisoned");
        entries
            .get(key)
            .filter(|v| v.is_fresh(now, ttl))
            .map(|v| v.balance)
    }

    fn store(&self, key: CacheKey, balance: Decimal) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key,
            CachedValue {
                balance,
                fetched_at: Utc::now(),
            },
        );
    }

    pub async fn get_token_balance(&self, pub_key: &str, token: Token, force: bool) -> Decimal {
        let key = CacheKey::Token(token, pub_key.to_string());
        if !force {
            if let Some(balance) = self.cached(&key, TOKEN_TTL) {
                return balance;
            }
        }
        let balance = self.chain.get_token_balance(pub_key, token).await;
        self.store(key, balance);
        balance
    }

    pub async fn get_sol_balance(&self, pub_key: &str, force: bool) -> Decimal {
        let key = CacheKey::Sol(pub_key.to_string());
        if !force {
            if let Some(balance) = self.cached(&key, SOL_TTL) {
                return balance;
            }
        }
        let balance = self.chain.get_sol_balance(pub_key).await;
        self.store(key, balance);
        balance
    }

    /// Fans out USDC/USDT/SOL reads in parallel and composes the result.
    pub async fn get_all_balances(&self, pub_key: &str, force: bool) -> WalletBalances {
        let (usdc, usdt, sol) = future::join3(
            self.get_token_balance(pub_key, Token::Usdc, force),
            self.get_token_balance(pub_key, Token::Usdt, force),
            self.get_sol_balance(pub_key, force),
        )
        .await;
        WalletBalances { usdc, usdt, sol }
    }

    /// Removes `token`'s key if given, otherwise removes all three keys for
    /// `pub_key`.
    pub fn invalidate(&self, pub_key: &str, token: Option<Token>) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match token {
            Some(token) => {
                entries.remove(&CacheKey::Token(token, pub_key.to_string()));
            }
            None => {
                entries.remove(&CacheKey::Token(Token::Usdc, pub_key.to_string()));
                entries.remove(&CacheKey::Token(Token::Usdt, pub_key.to_string()));
                entries.remove(&CacheKey::Sol(pub_key.to_string()));
            }
        }
    }

    pub async fn check_sufficient_balance(
        &self,
        pub_key: &str,
        required: Decimal,
        token: Token,
    ) -> (bool, Decimal) {
        let current = self.get_token_balance(pub_key, token, false).await;
        (current >= required, current)
    }

    pub async fn check_sufficient_sol_for_fees(&self, pub_key: &str, min: Decimal) -> (bool, Decimal) {
        let current = self.get_sol_balance(pub_key, false).await;
        (current >= min, current)
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use solana_sdk::commitment_config::CommitmentConfig;

    use super::*;
    use crate::chain::TokenMints;

    fn chain() -> Arc<ChainClient> {
        Arc::new(ChainClient::new("http://localhost:8899", CommitmentConfig::confirmed(), TokenMints::mainnet()))
    }

    #[test]
    fn invalidate_without_token_clears_all_three_keys() {
        let chain = chain();
        let cache = BalanceCache::new(chain);
        cache.store(CacheKey::Token(Token::Usdc, "pub".to_string()), dec!(1));
        cache.store(CacheKey::Token(Token::Usdt, "pub".to_string()), dec!(2));
        cache.store(CacheKey::Sol("pub".to_string()), dec!(3));

        cache.invalidate("pub", None);

        assert!(cache.cached(&CacheKey::Token(Token::Usdc, "pub".to_string()), TOKEN_TTL).is_none());
        assert!(cache.cached(&CacheKey::Token(Token::Usdt, "pub".to_string()), TOKEN_TTL).is_none());
        assert!(cache.cached(&CacheKey::Sol("pub".to_string()), SOL_TTL).is_none());
    }

    #[test]
    fn invalidate_with_token_only_clears_that_key() {
        let chain = chain();
        let cache = BalanceCache::new(chain);
        cache.store(CacheKey::Token(Token::Usdc, "pub".to_string()), dec!(1));
        cache.store(CacheKey::Sol("pub".to_string()), dec!(3));

        cache.invalidate("pub", Some(Token::Usdc));

        assert!(cache.cached(&CacheKey::Token(Token::Usdc, "pub".to_string()), TOKEN_TTL).is_none());
        assert!(cache.cached(&CacheKey::Sol("pub".to_string()), SOL_TTL).is_some());
    }

    #[test]
    fn cached_value_respects_ttl() {
        let fresh = CachedValue {
            balance: dec!(1),
            fetched_at: Utc::now(),
        };
        assert!(fresh.is_fresh(Utc::now(), TOKEN_TTL));

        let stale = CachedValue {
            balance: dec!(1),
            fetched_at: Utc::now() - chrono::Duration::seconds(31),
        };
        assert!(!stale.is_fresh(Utc::now(), TOKEN_TTL));
    }
}
