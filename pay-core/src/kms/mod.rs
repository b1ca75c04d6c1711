//! C1: wrap/unwrap a 32-byte data-encryption-key (DEK) via an external KMS,
//! then use the plaintext DEK to AES-256-GCM-seal a message under a fresh
//! per-message IV.
//!
//! Invariants: the DEK is unique per [`KmsAdapter::encrypt`] call; the
//! plaintext DEK is zeroed before returning; the master key never leaves
//! the provider boundary (providers call out to the KMS; only `LocalDev`
//! loads a raw key from configuration).

mod aws;
mod azure;
pub mod blob;
mod local;
mod provider;

pub use aws::AwsKmsProvider;
pub use azure::AzureKeyVaultProvider;
pub use local::LocalDevProvider;
pub use provider::KmsProvider;

use pay_common::rng::{Crng, RngExt};
use ring::aead;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum KmsError {
    /// Tag verification, wrap, or unwrap failed. Deliberately generic —
    /// surfaced to callers as `CryptoAuth` (§7) with no further detail.
    #[error("crypto authentication failure")]
    CryptoAuth,
}

pub struct KmsAdapter<P> {
    provider: P,
}

impl<P: KmsProvider> KmsAdapter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn key_version(&self) -> String {
        self.provider.key_version()
    }

    /// Generates a fresh DEK, wraps it via the provider, and seals
    /// `plaintext` under the DEK with a random 12-byte IV. Returns
    /// `(blob, key_version)` where `blob` is the base64 envelope of §6.4.
    pub async fn encrypt(
        &self,
        rng: &mut impl Crng,
        plaintext: &[u8],
    ) -> Result<(String, String), KmsError> {
        let mut dek = rng.gen_bytes::<32>();
        let wrapped_dek = self.provider.wrap_dek(&dek).await?;

        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &dek)
            .map_err(|_| KmsError::CryptoAuth)?;
        let key = aead::LessSafeKey::new(unbound);
        let iv = rng.gen_bytes::<{ blob::IV_LEN }>();
        let nonce = aead::Nonce::assume_unique_for_key(iv);

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| KmsError::CryptoAuth)?;

        use zeroize::Zeroize;
        dek.zeroize();

        let encoded = blob::encode(&wrapped_dek, iv, &in_out);
        Ok((encoded, self.provider.key_version()))
    }

    /// Reverses [`Self::encrypt`]. `key_version` is accepted for parity
    /// with the contract (a future multi-version provider could route on
    /// it) but the current providers are each bound to a single version.
    pub async fn decrypt(
        &self,
        blob: &str,
        _key_version: &str,
    ) -> Result<Vec<u8>, KmsError> {
        let raw = self::blob::decode(blob).map_err(|_| KmsError::CryptoAuth)?;
        let envelope = self::blob::parse(&raw).map_err(|_| KmsError::CryptoAuth)?;

        let mut dek = self.provider.unwrap_dek(envelope.wrapped_dek).await?;

        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &dek)
            .map_err(|_| KmsError::CryptoAuth)?;
        let key = aead::LessSafeKey::new(unbound);
        let nonce = aead::Nonce::assume_unique_for_key(envelope.iv);

        let mut in_out = envelope.ciphertext_and_tag.to_vec();
        let plaintext = key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| KmsError::CryptoAuth)?
            .to_vec();

        use zeroize::Zeroize;
        dek.zeroize();

        Ok(plaintext)
    }
}

#[cfg(test)]
mod test {
    use pay_common::rng::SysRng;

    use super::*;

    #[tokio::test]
    async fn encrypt_decrypt_round_trip() {
        let adapter = KmsAdapter::new(LocalDevProvider::new([3u8; 32]));
        let mut rng = SysRng::new();
        let plaintext = b"super secret payload".to_vec();

        let (blob, key_version) = adapter.encrypt(&mut rng, &plaintext).await.unwrap();
        let decrypted = adapter.decrypt(&blob, &key_version).await.unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[tokio::test]
    async fn each_encrypt_call_uses_a_fresh_dek() {
        let adapter = KmsAdapter::new(LocalDevProvider::new([3u8; 32]));
        let mut rng = SysRng::new();
        let (blob_a, _) = adapter.encrypt(&mut rng, b"same plaintext").await.unwrap();
        let (blob_b, _) = adapter.encrypt(&mut rng, b"same plaintext").await.unwrap();
        assert_ne!(blob_a, blob_b);
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_to_decrypt() {
        let adapter = KmsAdapter::new(LocalDevProvider::new([3u8; 32]));
        let mut rng = SysRng::new();
        let (blob, key_version) = adapter.encrypt(&mut rng, b"hello").await.unwrap();

        let mut raw = self::blob::decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        use base64::Engine;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);

        assert!(adapter.decrypt(&tampered, &key_version).await.is_err());
    }
}
