//! C2: Ed25519 keypair generation and envelope-encrypted custody on top of
//! C1.
//!
//! Operations mirror §4.2 exactly: `generate`, `decrypt`, `rotate`,
//! `validate`. The payload-binding to `user_id` (see
//! [`pay_common::domain::payload`]) is what makes `decrypt` fail closed on
//! a row-swap rather than silently returning the wrong owner's secret.

use chrono::Utc;
use ed25519_dalek::SigningKey;
use pay_common::domain::payload::{EncryptedPayload, PayloadError};
use pay_common::domain::wallet::KEY_ALGORITHM;
use pay_common::domain::Wallet;
use pay_common::rng::Crng;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::kms::{KmsAdapter, KmsError, KmsProvider};

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum WalletCryptoError {
    #[error("wallet row is malformed")]
    WalletInvalid,
    #[error("envelope decryption failed")]
    DecryptionFailed,
    #[error("decrypted payload failed validation")]
    InvalidPayload,
    #[error("decrypted payload version {0} is not supported")]
    UnsupportedVersion(u8),
    #[error("decrypted payload's embedded user_id does not match the wallet's owner")]
    UserMismatch,
    #[error("decrypted secret does not derive the wallet's stored public key")]
    KeyMismatch,
}

impl From<KmsError> for WalletCryptoError {
    fn from(_: KmsError) -> Self {
        Self::DecryptionFailed
    }
}

impl From<PayloadError> for WalletCryptoError {
    fn from(e: PayloadError) -> Self {
        match e {
            PayloadError::WrongLength(_) | PayloadError::BadMagic => Self::InvalidPayload,
            PayloadError::UnsupportedVersion(v) => Self::UnsupportedVersion(v),
        }
    }
}

/// The decrypted 64-byte Ed25519 secret (32-byte seed + 32-byte public key,
/// matching `ed25519-dalek`'s keypair encoding). Zeroized on drop; callers
/// must not let it outlive the scope that needed it.
pub type Secret = Zeroizing<[u8; 64]>;

pub struct WalletCrypto<P> {
    kms: KmsAdapter<P>,
}

impl<P: KmsProvider> WalletCrypto<P> {
    pub fn new(kms: KmsAdapter<P>) -> Self {
        Self { kms }
    }

    /// Creates a new Ed25519 keypair, composes the 93-byte payload, and
    /// seals it via C1. The plaintext secret is zeroed before returning.
    pub async fn generate(
        &self,
        rng: &mut impl Crng,
        user_id: Uuid,
    ) -> Result<Wallet, WalletCryptoError> {
        let signing_key = SigningKey::generate(rng);
        let public_key = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();

        let mut secret = [0u8; 64];
        secret[..32].copy_from_slice(&signing_key.to_bytes());
        secret[32..].copy_from_slice(signing_key.verifying_key().as_bytes());

        let payload = EncryptedPayload::new(Utc::now().timestamp(), user_id, secret);
        let plaintext = payload.encode();
        drop(payload);

        let (blob, key_version) = self.kms.encrypt(rng, &plaintext).await?;

        let now = Utc::now();
        Ok(Wallet {
            id: Uuid::new_v4(),
            user_id,
            public_key,
            encrypted_private_key: blob,
            key_version,
            key_algorithm: KEY_ALGORITHM.to_string(),
            cached_usdc_balance: None,
            cached_usdt_balance: None,
            balance_last_updated_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decrypts `wallet`'s blob, validating magic, version, the embedded
    /// `user_id` against `wallet.user_id`, and that the decrypted seed
    /// actually derives `wallet.public_key`.
    pub async fn decrypt(&self, wallet: &Wallet) -> Result<Secret, WalletCryptoError> {
        let plaintext = self
            .kms
            .decrypt(&wallet.encrypted_private_key, &wallet.key_version)
            .await?;
        let payload = EncryptedPayload::decode(&plaintext)?;
        if payload.user_id != wallet.user_id {
            return Err(WalletCryptoError::UserMismatch);
        }

        let seed: [u8; 32] = payload.secret_key[..32].try_into().expect("secret_key is 64 bytes");
        let derived_public_key = bs58::encode(SigningKey::from_bytes(&seed).verifying_key().as_bytes()).into_string();
        if derived_public_key != wallet.public_key {
            return Err(WalletCryptoError::KeyMismatch);
        }

        Ok(Zeroizing::new(payload.secret_key))
    }

    /// Decrypts with the old `key_version`, then re-encrypts (picking up
    /// whatever master key version C1 is currently on). The public key is
    /// unchanged.
    pub async fn rotate(
        &self,
        rng: &mut impl Crng,
        wallet: &Wallet,
    ) -> Result<Wallet, WalletCryptoError> {
        let secret = self.decrypt(wallet).await?;
        let payload = EncryptedPayload::new(Utc::now().timestamp(), wallet.user_id, *secret);
        let plaintext = payload.encode();
        drop(payload);

        let (blob, key_version) = self.kms.encrypt(rng, &plaintext).await?;

        let mut rotated = wallet.clone();
        rotated.encrypted_private_key = blob;
        rotated.key_version = key_version;
        rotated.updated_at = Utc::now();
        Ok(rotated)
    }

    /// Runs `decrypt` and discards the result; `true` iff no error.
    pub async fn validate(&self, wallet: &Wallet) -> bool {
        self.decrypt(wallet).await.is_ok()
    }
}
