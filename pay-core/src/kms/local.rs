//! The `LocalDev` provider: a raw AES-GCM wrap of the DEK under a 32-byte
//! symmetric master key loaded from configuration. Not for production —
//! [`pay_common::config::DeployEnv::validate_kms_provider`] refuses to
//! start it outside `Dev`.

use async_trait::async_trait;
use ring::aead;
use zeroize::Zeroizing;

use super::{KmsError, KmsProvider};

/// A fixed, all-zero nonce. Safe here because the master key is used to
/// wrap at most one DEK per call and the wrapped DEK is never reused as
/// plaintext for a second wrap under the same key material — unlike the
/// per-message payload encryption, key wear-out isn't a concern at the
/// volumes a single node's local-dev key ever sees.
const WRAP_NONCE: [u8; 12] = [0u8; 12];

pub struct LocalDevProvider {
    master_key: Zeroizing<[u8; 32]>,
}

impl LocalDevProvider {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self {
            master_key: Zeroizing::new(master_key),
        }
    }

    fn unbound_key(&self) -> Result<aead::UnboundKey, KmsError> {
        aead::UnboundKey::new(&aead::AES_256_GCM, self.master_key.as_slice())
            .map_err(|_| KmsError::CryptoAuth)
    }
}

#[async_trait]
impl KmsProvider for LocalDevProvider {
    async fn wrap_dek(&self, dek: &[u8; 32]) -> Result<Vec<u8>, KmsError> {
        let key = aead::LessSafeKey::new(self.unbound_key()?);
        let nonce = aead::Nonce::assume_unique_for_key(WRAP_NONCE);
        let mut in_out = dek.to_vec();
        key.seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| KmsError::CryptoAuth)?;
        Ok(in_out)
    }

    async fn unwrap_dek(&self, wrapped: &[u8]) -> Result<[u8; 32], KmsError> {
        let key = aead::LessSafeKey::new(self.unbound_key()?);
        let nonce = aead::Nonce::assume_unique_for_key(WRAP_NONCE);
        let mut in_out = wrapped.to_vec();
        let plaintext = key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| KmsError::CryptoAuth)?;
        plaintext.try_into().map_err(|_| KmsError::CryptoAuth)
    }

    fn key_version(&self) -> String {
        "local-v1".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn wrap_unwrap_round_trip() {
        let provider = LocalDevProvider::new([7u8; 32]);
        let dek = [42u8; 32];
        let wrapped = provider.wrap_dek(&dek).await.unwrap();
        let unwrapped = provider.unwrap_dek(&wrapped).await.unwrap();
        assert_eq!(unwrapped, dek);
    }

    #[tokio::test]
    async fn tampered_wrapped_dek_fails_to_unwrap() {
        let provider = LocalDevProvider::new([7u8; 32]);
        let mut wrapped = provider.wrap_dek(&[42u8; 32]).await.unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xff;
        assert!(matches!(
            provider.unwrap_dek(&wrapped).await,
            Err(KmsError::CryptoAuth)
        ));
    }

    #[test]
    fn key_version_is_stable() {
        let provider = LocalDevProvider::new([1u8; 32]);
        assert_eq!(provider.key_version(), "local-v1");
    }
}
