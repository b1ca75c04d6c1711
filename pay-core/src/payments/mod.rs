//! C5: idempotent submission, limit enforcement, persistence, and
//! orchestration of C2+C3 under retry.
//!
//! Follows the teacher's check → persist → commit discipline used by
//! payment state updates: every precondition (idempotency, rate limit,
//! sender status, limits, receiver, balance) is checked before a row is
//! ever written, the row is persisted as `Processing`, and only then is
//! the chain submission attempted. Unlike the teacher, there is no
//! separate in-process "pending" map here — the store itself is the
//! single source of truth, so "commit" is simply "the store accepted the
//! conditional update".

pub mod limits;

use std::sync::Arc;

use chrono::Utc;
use pay_common::amount::Token;
use pay_common::domain::{AuditLog, Transaction, TransactionStatus, TransactionType};
use pay_common::error::{PaymentError, PaymentErrorKind};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::BalanceCache;
use crate::chain::{with_retry, ChainClient};
use crate::fees::FeePolicy;
use crate::kms::KmsProvider;
use crate::traits::{AuditStore, RateLimiter, TransactionStore, UserStore, WalletStore, WithdrawalAllowlist};
use crate::wallet::WalletCrypto;
use limits::{check_limit, LimitWindow};

/// Lamports have 9 decimal places on Solana; this converts a lamport fee
/// into the same `Decimal` unit `BalanceCache::get_sol_balance` returns.
fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::new(lamports as i64, 9)
}

pub struct SendPaymentRequest {
    pub recipient_phone: String,
    pub amount: Decimal,
    pub token: Token,
    pub idempotency_key: String,
}

pub struct WithdrawRequest {
    pub destination_address: String,
    pub amount: Decimal,
    pub token: Token,
    pub idempotency_key: String,
}

#[derive(Debug)]
pub struct PaymentResponse {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub token: Token,
    pub signature: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<&Transaction> for PaymentResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            status: tx.status,
            amount: tx.amount,
            token: tx.token,
            signature: tx.solana_signature.clone(),
            created_at: tx.created_at,
        }
    }
}

pub struct PaymentsEngine<P> {
    users: Arc<dyn UserStore>,
    wallets: Arc<dyn WalletStore>,
    transactions: Arc<dyn TransactionStore>,
    audit: Arc<dyn AuditStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    chain: Arc<ChainClient>,
    cache: Arc<BalanceCache>,
    wallet_crypto: Arc<WalletCrypto<P>>,
    fee_policy: Arc<dyn FeePolicy>,
    withdrawal_allowlist: Option<Arc<dyn WithdrawalAllowlist>>,
    /// Wakes the scheduler's `process_pending` job as soon as a signature
    /// lands, instead of leaving it to wait out the full poll interval.
    submitted: pay_common::notify::Sender,
}

impl<P: KmsProvider> PaymentsEngine<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        wallets: Arc<dyn WalletStore>,
        transactions: Arc<dyn TransactionStore>,
        audit: Arc<dyn AuditStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        chain: Arc<ChainClient>,
        cache: Arc<BalanceCache>,
        wallet_crypto: Arc<WalletCrypto<P>>,
        fee_policy: Arc<dyn FeePolicy>,
        withdrawal_allowlist: Option<Arc<dyn WithdrawalAllowlist>>,
        submitted: pay_common::notify::Sender,
    ) -> Self {
        Self {
            users,
            wallets,
            transactions,
            audit,
            rate_limiter,
            chain,
            cache,
            wallet_crypto,
            fee_policy,
            withdrawal_allowlist,
            submitted,
        }
    }

    /// Estimates the network fee via C3 when both ends parse as on-chain
    /// addresses, falling back to the pluggable flat policy otherwise (e.g.
    /// a malformed withdrawal address that will fail submission anyway).
    async fn check_fee_coverage(&self, sender_pub: &str, recipient_pub: &str, token: Token) -> Result<(), PaymentError> {
        let lamports = match (ChainClient::parse_pubkey(sender_pub), ChainClient::parse_pubkey(recipient_pub)) {
            (Ok(sender), Ok(recipient)) => self.chain.estimate_transfer_fee(&sender, &recipient, token).await,
            _ => self.fee_policy.flat_fee_lamports(),
        };
        let fee = lamports_to_sol(lamports);
        let (sufficient, available) = self.cache.check_sufficient_sol_for_fees(sender_pub, fee).await;
        if !sufficient {
            return Err(PaymentError::new(
                PaymentErrorKind::InsufficientBalance,
                format!("sender SOL balance {available} cannot cover the estimated network fee of {fee}"),
            ));
        }
        Ok(())
    }

    #[instrument(skip_all, name = "(send-payment)", fields(sender_id = %sender_id))]
    pub async fn send_payment(
        &self,
        sender_id: Uuid,
        request: SendPaymentRequest,
    ) -> Result<PaymentResponse, PaymentError> {
        // 1. Idempotency.
        if let Some(existing) = self
            .transactions
            .find_by_idempotency_key(&request.idempotency_key)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
        {
            return Ok(PaymentResponse::from(&existing));
        }

        // 2. Rate limit.
        if !self
            .rate_limiter
            .check_and_increment("transfer", &sender_id.to_string())
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
        {
            return Err(PaymentError::new(PaymentErrorKind::RateLimited, "too many transfer requests"));
        }

        // 3. Load sender.
        let sender = self
            .users
            .find_by_id(sender_id)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("sender not found"))?;
        if !sender.can_transact() {
            return Err(PaymentError::new(PaymentErrorKind::AccountFrozen, "account is frozen or inactive"));
        }

        // 4. Limits.
        check_limit(
            self.transactions.as_ref(),
            sender_id,
            sender.daily_limit_reset_at,
            sender.daily_transfer_limit,
            request.amount,
            LimitWindow::Daily,
        )
        .await?;
        check_limit(
            self.transactions.as_ref(),
            sender_id,
            sender.monthly_limit_reset_at,
            sender.monthly_transfer_limit,
            request.amount,
            LimitWindow::Monthly,
        )
        .await?;

        // 5. Resolve receiver, reject self-transfer.
        let receiver = self
            .users
            .find_by_phone(&request.recipient_phone)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("recipient not found"))?;
        if receiver.id == sender_id {
            return Err(PaymentError::validation("cannot send a payment to yourself"));
        }

        // 6. Load wallets.
        let sender_wallet = self
            .wallets
            .find_by_user_id(sender_id)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("sender wallet not found"))?;
        let receiver_wallet = self
            .wallets
            .find_by_user_id(receiver.id)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("recipient wallet not found"))?;

        // 7. Balance pre-check.
        let (sufficient, available) = self
            .cache
            .check_sufficient_balance(&sender_wallet.public_key, request.amount, request.token)
            .await;
        if !sufficient {
            return Err(PaymentError::new(
                PaymentErrorKind::InsufficientBalance,
                format!("requested {}, available {available}", request.amount),
            ));
        }
        self.check_fee_coverage(&sender_wallet.public_key, &receiver_wallet.public_key, request.token)
            .await?;

        self.submit(
            sender_id,
            &sender_wallet,
            TransactionType::Transfer,
            Some(receiver.id),
            None,
            request.amount,
            request.token,
            &request.idempotency_key,
            &sender_wallet.public_key,
            &receiver_wallet.public_key,
        )
        .await
    }

    /// Identical pipeline to `send_payment`, except the receiver is a
    /// literal external address: no receiver lookup, `type=Withdrawal`,
    /// and no receiver cache invalidation.
    #[instrument(skip_all, name = "(withdraw)", fields(sender_id = %sender_id))]
    pub async fn withdraw(
        &self,
        sender_id: Uuid,
        request: WithdrawRequest,
    ) -> Result<PaymentResponse, PaymentError> {
        if let Some(existing) = self
            .transactions
            .find_by_idempotency_key(&request.idempotency_key)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
        {
            return Ok(PaymentResponse::from(&existing));
        }

        if !self
            .rate_limiter
            .check_and_increment("transfer", &sender_id.to_string())
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
        {
            return Err(PaymentError::new(PaymentErrorKind::RateLimited, "too many transfer requests"));
        }

        let sender = self
            .users
            .find_by_id(sender_id)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("sender not found"))?;
        if !sender.can_transact() {
            return Err(PaymentError::new(PaymentErrorKind::AccountFrozen, "account is frozen or inactive"));
        }

        check_limit(
            self.transactions.as_ref(),
            sender_id,
            sender.daily_limit_reset_at,
            sender.daily_transfer_limit,
            request.amount,
            LimitWindow::Daily,
        )
        .await?;
        check_limit(
            self.transactions.as_ref(),
            sender_id,
            sender.monthly_limit_reset_at,
            sender.monthly_transfer_limit,
            request.amount,
            LimitWindow::Monthly,
        )
        .await?;

        if let Some(allowlist) = &self.withdrawal_allowlist {
            let allowed = allowlist
                .is_allowed(&request.destination_address)
                .await
                .map_err(|e| PaymentError::internal(e.to_string()))?;
            if !allowed {
                return Err(PaymentError::validation("destination address is not on the withdrawal allowlist"));
            }
        }

        let sender_wallet = self
            .wallets
            .find_by_user_id(sender_id)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?
            .ok_or_else(|| PaymentError::not_found("sender wallet not found"))?;

        let (sufficient, available) = self
            .cache
            .check_sufficient_balance(&sender_wallet.public_key, request.amount, request.token)
            .await;
        if !sufficient {
            return Err(PaymentError::new(
                PaymentErrorKind::InsufficientBalance,
                format!("requested {}, available {available}", request.amount),
            ));
        }
        self.check_fee_coverage(&sender_wallet.public_key, &request.destination_address, request.token)
            .await?;

        self.submit(
            sender_id,
            &sender_wallet,
            TransactionType::Withdrawal,
            None,
            Some(request.destination_address.clone()),
            request.amount,
            request.token,
            &request.idempotency_key,
            &sender_wallet.public_key,
            &request.destination_address,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        sender_id: Uuid,
        sender_wallet: &pay_common::domain::Wallet,
        transaction_type: TransactionType,
        receiver_id: Option<Uuid>,
        external_address: Option<String>,
        amount: Decimal,
        token: Token,
        idempotency_key: &str,
        sender_pub: &str,
        recipient_pub: &str,
    ) -> Result<PaymentResponse, PaymentError> {
        // 8. Persist Processing before submission.
        let now = Utc::now();
        let mut tx = Transaction {
            id: Uuid::new_v4(),
            idempotency_key: idempotency_key.to_string(),
            sender_id,
            receiver_id,
            external_address,
            amount,
            token,
            transaction_type,
            status: TransactionStatus::Processing,
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
        };
        self.transactions
            .insert(&tx)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?;

        // 9-10. Scoped-acquire sender secret, submit via chain client.
        let submission = {
            let secret = self
                .wallet_crypto
                .decrypt(sender_wallet)
                .await
                .map_err(|_| PaymentError::new(PaymentErrorKind::CryptoAuth, "could not unlock sender wallet"))?;
            let chain = self.chain.clone();
            let recipient_pub = recipient_pub.to_string();
            with_retry("transfer_token", || {
                let chain = chain.clone();
                let secret = zeroize::Zeroizing::new(*secret);
                let recipient_pub = recipient_pub.clone();
                async move { chain.transfer_token(&secret, &recipient_pub, amount, token).await }
            })
            .await
            // `secret` (the Zeroizing guard) drops here, zeroing the key material.
        };

        match submission {
            Ok(signature) => {
                // 11. Leave status at Processing: the scheduler's
                // `process_pending`/confirmation monitor (C6) performs the
                // authoritative Confirmed/Failed transition once the chain
                // has finalized the signature.
                tx.solana_signature = Some(signature.clone());
                info!(transaction_id = %tx.id, %signature, "payment submitted");
                self.submitted.send();
            }
            Err(e) => {
                warn!(transaction_id = %tx.id, error = %e, "payment submission failed");
                tx.mark_failed(e.to_string(), Utc::now())
                    .map_err(|_| PaymentError::internal("illegal state transition"))?;
            }
        }
        tx.updated_at = Utc::now();
        self.transactions
            .compare_and_update_status(tx.id, &[TransactionStatus::Processing], &tx)
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?;

        // 13. Invalidate caches.
        self.cache.invalidate(sender_pub, Some(token));
        if tx.transaction_type == TransactionType::Transfer {
            self.cache.invalidate(recipient_pub, Some(token));
        }

        // 14. Audit.
        self.audit
            .append(
                AuditLog::new(pay_common::domain::audit_log::actions::PAYMENT_SENT, "transaction")
                    .with_user(sender_id)
                    .with_entity(tx.id),
            )
            .await
            .map_err(|e| PaymentError::internal(e.to_string()))?;

        Ok(PaymentResponse::from(&tx))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_response_carries_signature_and_status() {
        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            idempotency_key: "k".to_string(),
            sender_id: Uuid::new_v4(),
            receiver_id: Some(Uuid::new_v4()),
            external_address: None,
            amount: Decimal::ONE,
            token: Token::Usdc,
            transaction_type: TransactionType::Transfer,
            status: TransactionStatus::Processing,
            solana_signature: Some("SIG1".to_string()),
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
        };
        let response = PaymentResponse::from(&tx);
        assert_eq!(response.signature.as_deref(), Some("SIG1"));
        assert_eq!(response.status, TransactionStatus::Processing);
    }
}
