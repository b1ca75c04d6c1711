//! C3: a typed async facade over the chain RPC, mirroring the teacher's
//! bitcoind facade (`LexeBitcoind`) — wrap a single RPC client, expose
//! typed methods, map transport/API failures to a component error with
//! `anyhow::Context` for the diagnostic trail.

mod retry;

use ed25519_dalek::SigningKey;
use pay_common::amount::{to_raw_amount, Token, TOKEN_DECIMALS};
use pay_common::rng::Crng;
use rust_decimal::Decimal;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account;
use std::str::FromStr;
use std::time::Duration;

pub use retry::with_retry;

#[derive(Clone, Debug, thiserror::Error)]
pub enum ChainError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("recipient address is not a valid base58 public key")]
    InvalidAddress,
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Decimal, available: Decimal },
    #[error("chain RPC error: {0}")]
    Rpc(String),
}

/// Minimal details the monitor needs to advance a transaction's state.
#[derive(Clone, Copy, Debug)]
pub struct TxDetails {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub fee: u64,
    pub is_success: bool,
}

pub struct ChainClient {
    rpc: RpcClient,
    mints: TokenMints,
}

#[derive(Clone, Copy, Debug)]
pub struct TokenMints {
    pub usdc: Pubkey,
    pub usdt: Pubkey,
}

impl TokenMints {
    pub fn mainnet() -> Self {
        Self {
            usdc: Pubkey::from_str(Token::Usdc.default_mint()).expect("hardcoded mint is valid"),
            usdt: Pubkey::from_str(Token::Usdt.default_mint()).expect("hardcoded mint is valid"),
        }
    }

    pub fn of(&self, token: Token) -> Pubkey {
        match token {
            Token::Usdc => self.usdc,
            Token::Usdt => self.usdt,
        }
    }
}

impl ChainClient {
    pub fn new(rpc_url: impl Into<String>, commitment: CommitmentConfig, mints: TokenMints) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.into(), commitment),
            mints,
        }
    }

    /// Pure: generates a new Ed25519 keypair and returns its base58 public
    /// key alongside the 64-byte secret (32-byte seed + 32-byte verifying
    /// key, matching `ed25519-dalek`'s encoding).
    pub fn generate_keypair(rng: &mut impl Crng) -> (String, [u8; 64]) {
        let signing_key = SigningKey::generate(rng);
        let public_key = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
        let mut secret = [0u8; 64];
        secret[..32].copy_from_slice(&signing_key.to_bytes());
        secret[32..].copy_from_slice(signing_key.verifying_key().as_bytes());
        (public_key, secret)
    }

    fn keypair_from_secret(secret: &[u8; 64]) -> Result<Keypair, ChainError> {
        Keypair::try_from(secret.as_slice()).map_err(|_| ChainError::Rpc("malformed keypair secret".to_string()))
    }

    pub(crate) fn parse_pubkey(s: &str) -> Result<Pubkey, ChainError> {
        if !(32..=44).contains(&s.len()) {
            return Err(ChainError::InvalidAddress);
        }
        Pubkey::from_str(s).map_err(|_| ChainError::InvalidAddress)
    }

    async fn ata_exists(&self, ata: &Pubkey) -> bool {
        self.rpc.get_account(ata).await.is_ok()
    }

    /// Builds the instruction list `transfer_token` and `estimate_transfer_fee`
    /// both need: an optional ATA-creation instruction (if the recipient's
    /// ATA does not yet exist) followed by the token transfer itself.
    async fn build_transfer_instructions(
        &self,
        sender: &Pubkey,
        recipient: &Pubkey,
        token: Token,
        raw_amount: u64,
    ) -> Result<(Vec<solana_sdk::instruction::Instruction>, bool), ChainError> {
        let mint = self.mints.of(token);
        let sender_ata = get_associated_token_address(sender, &mint);
        let recipient_ata = get_associated_token_address(recipient, &mint);

        let recipient_ata_missing = !self.ata_exists(&recipient_ata).await;

        let mut instructions = Vec::with_capacity(2);
        if recipient_ata_missing {
            instructions.push(create_associated_token_account(
                sender,
                recipient,
                &mint,
                &spl_token::id(),
            ));
        }
        instructions.push(
            spl_token::instruction::transfer_checked(
                &spl_token::id(),
                &sender_ata,
                &mint,
                &recipient_ata,
                sender,
                &[],
                raw_amount,
                TOKEN_DECIMALS as u8,
            )
            .map_err(|e| ChainError::Rpc(e.to_string()))?,
        );

        Ok((instructions, recipient_ata_missing))
    }

    /// Validates and submits a token transfer. Retried by the caller via
    /// [`with_retry`] per §4.3's policy; this method itself makes a single
    /// attempt.
    pub async fn transfer_token(
        &self,
        secret: &[u8; 64],
        recipient_pub: &str,
        amount: Decimal,
        token: Token,
    ) -> Result<String, ChainError> {
        let raw_amount = to_raw_amount(amount).filter(|&r| r > 0).ok_or(ChainError::InvalidAmount)?;
        let recipient = Self::parse_pubkey(recipient_pub)?;
        let keypair = Self::keypair_from_secret(secret)?;
        let sender = keypair.pubkey();

        let sender_ata = get_associated_token_address(&sender, &self.mints.of(token));
        let sender_balance = self.read_raw_token_balance(&sender_ata).await.unwrap_or(0);
        if sender_balance < raw_amount {
            return Err(ChainError::InsufficientBalance {
                requested: amount,
                available: pay_common::amount::from_raw_amount(sender_balance),
            });
        }

        let (instructions, _ata_created) = self
            .build_transfer_instructions(&sender, &recipient, token, raw_amount)
            .await?;

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let message = Message::new(&instructions, Some(&sender));
        let transaction = Transaction::new(&[&keypair], message, blockhash);

        let signature = self
            .rpc
            .send_and_confirm_transaction_with_spinner_and_commitment(
                &transaction,
                CommitmentConfig::confirmed(),
            )
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(signature.to_string())
    }

    async fn read_raw_token_balance(&self, ata: &Pubkey) -> Result<u64, ChainError> {
        let balance = self
            .rpc
            .get_token_account_balance(ata)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        balance
            .amount
            .parse::<u64>()
            .map_err(|_| ChainError::Rpc("malformed token account balance".to_string()))
    }

    /// Zero on any lookup failure — accounts without an ATA return 0.
    pub async fn get_token_balance(&self, pub_key: &str, token: Token) -> Decimal {
        let Ok(owner) = Self::parse_pubkey(pub_key) else {
            return Decimal::ZERO;
        };
        let ata = get_associated_token_address(&owner, &self.mints.of(token));
        match self.read_raw_token_balance(&ata).await {
            Ok(raw) => pay_common::amount::from_raw_amount(raw),
            Err(_) => Decimal::ZERO,
        }
    }

    pub async fn get_sol_balance(&self, pub_key: &str) -> Decimal {
        let Ok(owner) = Self::parse_pubkey(pub_key) else {
            return Decimal::ZERO;
        };
        match self.rpc.get_balance(&owner).await {
            Ok(lamports) => Decimal::new(lamports as i64, 9),
            Err(_) => Decimal::ZERO,
        }
    }

    /// Creates the ATA if missing; `payer` funds the creation when one is
    /// needed and must be supplied in that case.
    pub async fn ensure_ata(
        &self,
        wallet_pub: &Pubkey,
        token: Token,
        payer: Option<&Keypair>,
    ) -> Result<(), ChainError> {
        let mint = self.mints.of(token);
        let ata = get_associated_token_address(wallet_pub, &mint);
        if self.ata_exists(&ata).await {
            return Ok(());
        }
        let payer = payer.ok_or_else(|| ChainError::Rpc("ATA missing and no payer supplied".to_string()))?;
        let instruction = create_associated_token_account(&payer.pubkey(), wallet_pub, &mint, &spl_token::id());
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let message = Message::new(&[instruction], Some(&payer.pubkey()));
        let transaction = Transaction::new(&[payer], message, blockhash);
        self.rpc
            .send_and_confirm_transaction_with_spinner_and_commitment(
                &transaction,
                CommitmentConfig::confirmed(),
            )
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(())
    }

    /// `true` iff the signature's status is `confirmed` or `finalized`.
    pub async fn is_confirmed(&self, signature: &str) -> bool {
        let Ok(signature) = Signature::from_str(signature) else {
            return false;
        };
        match self.rpc.get_signature_statuses(&[signature]).await {
            Ok(response) => response
                .value
                .first()
                .and_then(|s| s.as_ref())
                .map(|status| {
                    status.satisfies_commitment(CommitmentConfig::confirmed())
                        || status.satisfies_commitment(CommitmentConfig::finalized())
                })
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn get_tx_details(&self, signature: &str) -> Option<TxDetails> {
        let signature = Signature::from_str(signature).ok()?;
        let statuses = self.rpc.get_signature_statuses(&[signature]).await.ok()?;
        let status = statuses.value.first()?.as_ref()?;
        Some(TxDetails {
            slot: status.slot,
            block_time: None,
            fee: 0,
            is_success: status.err.is_none(),
        })
    }

    /// Falls back to `5000` lamports (`2_044_280` if an ATA would need to
    /// be created) when the RPC cannot estimate a fee.
    pub async fn estimate_transfer_fee(
        &self,
        sender: &Pubkey,
        recipient: &Pubkey,
        token: Token,
    ) -> u64 {
        const BASE_FEE_LAMPORTS: u64 = 5_000;
        const ATA_CREATION_FEE_LAMPORTS: u64 = 2_044_280;

        let Ok((instructions, ata_created)) = self
            .build_transfer_instructions(sender, recipient, token, 1)
            .await
        else {
            return BASE_FEE_LAMPORTS;
        };
        let fallback = if ata_created {
            ATA_CREATION_FEE_LAMPORTS
        } else {
            BASE_FEE_LAMPORTS
        };

        let Ok(blockhash) = self.rpc.get_latest_blockhash().await else {
            return fallback;
        };
        let mut message = Message::new(&instructions, Some(sender));
        message.recent_blockhash = blockhash;
        self.rpc
            .get_fee_for_message(&message)
            .await
            .unwrap_or(fallback)
    }

    /// Polls [`Self::is_confirmed`] every 500ms until `timeout` elapses.
    pub async fn wait_for_confirmation(&self, signature: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_confirmed(signature).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

#[cfg(test)]
mod test {
    use pay_common::rng::SysRng;

    use super::*;

    #[test]
    fn generate_keypair_produces_a_valid_base58_address() {
        let mut rng = SysRng::new();
        let (pub_key, secret) = ChainClient::generate_keypair(&mut rng);
        assert!(bs58::decode(&pub_key).into_vec().is_ok());
        assert_eq!(secret.len(), 64);
    }

    #[test]
    fn parse_pubkey_rejects_out_of_range_lengths() {
        assert!(matches!(ChainClient::parse_pubkey("short"), Err(ChainError::InvalidAddress)));
        let too_long = "1".repeat(60);
        assert!(matches!(ChainClient::parse_pubkey(&too_long), Err(ChainError::InvalidAddress)));
    }

    #[test]
    fn parse_pubkey_accepts_a_real_address() {
        let mut rng = SysRng::new();
        let (pub_key, _) = ChainClient::generate_keypair(&mut rng);
        assert!(ChainClient::parse_pubkey(&pub_key).is_ok());
    }
}
