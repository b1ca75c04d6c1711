//! The tagged commands a webhook parser (out of scope here, per §1) would
//! produce, and the handlers that turn each into a C4/C5 call. The HTTP
//! router in `http.rs` is a second, thinner caller of the same handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pay_common::amount::Token;
use pay_common::domain::{Transaction, TransactionStatus, TransactionType, User};
use pay_common::error::{PaymentError, PaymentErrorKind};
use pay_common::rng::SysRng;
use pay_core::cache::BalanceCache;
use pay_core::kms::KmsProvider;
use pay_core::payments::{PaymentResponse, PaymentsEngine, SendPaymentRequest, WithdrawRequest};
use pay_core::traits::{AuditStore, TransactionStore, UserStore, WalletStore};
use pay_core::wallet::WalletCrypto;
use rust_decimal::Decimal;
use uuid::Uuid;

pub enum Command {
    RegisterUser {
        phone_number: String,
    },
    SendPayment {
        sender_id: Uuid,
        recipient_phone: String,
        amount: Decimal,
        token: Token,
        idempotency_key: String,
    },
    CheckBalance {
        user_id: Uuid,
        refresh: bool,
    },
    GetHistory {
        user_id: Uuid,
        limit: u32,
        offset: u32,
    },
    Withdraw {
        sender_id: Uuid,
        destination_address: String,
        amount: Decimal,
        token: Token,
        idempotency_key: String,
    },
}

#[derive(Debug)]
pub struct RegisteredUser {
    pub user_id: Uuid,
    pub public_key: String,
}

#[derive(Clone, Debug)]
pub struct TransactionHistoryEntry {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub token: Token,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionHistoryEntry {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            status: tx.status,
            transaction_type: tx.transaction_type,
            amount: tx.amount,
            token: tx.token,
            signature: tx.solana_signature.clone(),
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug)]
pub enum CommandOutcome {
    Registered(RegisteredUser),
    Payment(PaymentResponse),
    Balance(pay_common::domain::wallet::WalletBalances),
    History(Vec<TransactionHistoryEntry>),
}

/// Default limits applied to a freshly registered user. A real deployment
/// would read these from `system_settings` (§6.2); hardcoded here since
/// that table's contents are out of this core's scope.
const DEFAULT_DAILY_LIMIT: &str = "1000";
const DEFAULT_MONTHLY_LIMIT: &str = "10000";

/// Bundles the collaborators a webhook parser's dispatcher needs, so each
/// `Command` variant becomes one call into C4/C5 without the caller having
/// to know which component owns which piece of state.
pub struct CommandHandlers<P> {
    pub users: Arc<dyn UserStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub cache: Arc<BalanceCache>,
    pub wallet_crypto: Arc<WalletCrypto<P>>,
    pub engine: Arc<PaymentsEngine<P>>,
}

impl<P: KmsProvider> CommandHandlers<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        wallets: Arc<dyn WalletStore>,
        transactions: Arc<dyn TransactionStore>,
        audit: Arc<dyn AuditStore>,
        cache: Arc<BalanceCache>,
        wallet_crypto: Arc<WalletCrypto<P>>,
        engine: Arc<PaymentsEngine<P>>,
    ) -> Self {
        Self {
            users,
            wallets,
            transactions,
            audit,
            cache,
            wallet_crypto,
            engine,
        }
    }

    pub async fn dispatch(&self, command: Command) -> Result<CommandOutcome, PaymentError> {
        match command {
            Command::RegisterUser { phone_number } => self.register_user(phone_number).await.map(CommandOutcome::Registered),
            Command::SendPayment {
                sender_id,
                recipient_phone,
                amount,
                token,
                idempotency_key,
            } => self
                .engine
                .send_payment(
                    sender_id,
                    SendPaymentRequest {
                        recipient_phone,
                        amount,
                        token,
                        idempotency_key,
                    },
                )
                .await
                .map(CommandOutcome::Payment),
            Command::CheckBalance { user_id, refresh } => self.check_balance(user_id, refresh).await.map(CommandOutcome::Balance),
            Command::GetHistory { user_id, limit, offset } => {
                self.get_history(user_id, limit, offset).await.map(CommandOutcome::History)
            }
            Command::Withdraw {
                sender_id,
                destination_address,
                amount,
                token,
                idempotency_key,
            } => self
                .engine
                .withdraw(
                    sender_id,
                    WithdrawRequest {
                        destination_address,
                        amount,
                        token,
                        idempotency_key,
                    },
                )
                .await
                .map(CommandOutcome::Payment),
        }
    }

    async fn register_user(&self, phone_number: String) -> Result<RegisteredUser, PaymentError> {
        if self
            .users
            .find_by_phone(&phone_number)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .is_some()
        {
            return Err(PaymentError::validation("phone number is already registered"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            phone_number,
            daily_transfer_limit: DEFAULT_DAILY_LIMIT.parse().expect("valid decimal literal"),
            daily_transferred_amount: Decimal::ZERO,
            daily_limit_reset_at: now,
            monthly_transfer_limit: DEFAULT_MONTHLY_LIMIT.parse().expect("valid decimal literal"),
            monthly_transferred_amount: Decimal::ZERO,
            monthly_limit_reset_at: now,
            is_active: true,
            is_frozen: false,
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        let mut rng = SysRng::new();
        let wallet = self
            .wallet_crypto
            .generate(&mut rng, user.id)
            .await
            .map_err(|_| PaymentError::new(PaymentErrorKind::CryptoAuth, "could not generate wallet"))?;

        self.users.save(&user).await.map_err(|e| PaymentError::internal(e.to_string()))?;
        self.wallets.save(&wallet).await.map_err(|e| PaymentError::internal(e.to_string()))?;

        Ok(RegisteredUser {
            user_id: user.id,
            public_key: wallet.public_key,
        })
    }

    async fn check_balance(&self, user_id: Uuid, refresh: bool) -> Result<pay_common::domain::wallet::WalletBalances, PaymentError> {
        let wallet = self
            .wallets
            .find_by_user_id(user_id)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("wallet not found"))?;
        Ok(self.cache.get_all_balances(&wallet.public_key, refresh).await)
    }

    async fn get_history(&self, user_id: Uuid, limit: u32, offset: u32) -> Result<Vec<TransactionHistoryEntry>, PaymentError> {
        let history = self
            .transactions
            .history(user_id, limit, offset)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?;
        Ok(history.iter().map(TransactionHistoryEntry::from).collect())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pay_core::chain::{ChainClient, TokenMints};
    use pay_core::fees::DefaultFeePolicy;
    use pay_core::kms::{KmsAdapter, LocalDevProvider};
    use solana_sdk::commitment_config::CommitmentConfig;

    use super::*;
    use crate::mock::MockBackend;

    fn handlers() -> CommandHandlers<LocalDevProvider> {
        let backend = Arc::new(MockBackend::new(1000, None));
        let chain = Arc::new(ChainClient::new("http://localhost:8899", CommitmentConfig::confirmed(), TokenMints::mainnet()));
        let cache = Arc::new(BalanceCache::new(chain.clone()));
        let wallet_crypto = Arc::new(WalletCrypto::new(KmsAdapter::new(LocalDevProvider::new([9u8; 32]))));
        let engine = Arc::new(PaymentsEngine::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            chain,
            cache.clone(),
            wallet_crypto.clone(),
            Arc::new(DefaultFeePolicy),
            None,
            pay_common::notify::channel().0,
        ));
        CommandHandlers::new(backend.clone(), backend.clone(), backend.clone(), backend, cache, wallet_crypto, engine)
    }

    #[tokio::test]
    async fn register_user_persists_user_and_wallet() {
        let handlers = handlers();
        let outcome = handlers
            .dispatch(Command::RegisterUser {
                phone_number: "+14155550101".to_string(),
            })
            .await
            .unwrap();
        let CommandOutcome::Registered(registered) = outcome else {
            panic!("expected Registered outcome");
        };
        assert!(!registered.public_key.is_empty());

        let user = handlers.users.find_by_id(registered.user_id).await.unwrap();
        assert!(user.is_some());
        let wallet = handlers.wallets.find_by_user_id(registered.user_id).await.unwrap();
        assert!(wallet.is_some());
    }

    #[tokio::test]
    async fn register_user_rejects_duplicate_phone_number() {
        let handlers = handlers();
        handlers
            .dispatch(Command::RegisterUser {
                phone_number: "+14155550101".to_string(),
            })
            .await
            .unwrap();
        let err = handlers
            .dispatch(Command::RegisterUser {
                phone_number: "+14155550101".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, PaymentErrorKind::Validation);
    }

    #[tokio::test]
    async fn history_is_empty_for_a_fresh_user() {
        let handlers = handlers();
        let outcome = handlers
            .dispatch(Command::GetHistory {
                user_id: Uuid::new_v4(),
                limit: 50,
                offset: 0,
            })
            .await
            .unwrap();
        let CommandOutcome::History(entries) = outcome else {
            panic!("expected History outcome");
        };
        assert!(entries.is_empty());
    }
}
