//! The `AwsKms` provider: `GenerateDataKey`/`Decrypt` against a symmetric
//! CMK, via the official `aws-sdk-kms` client (handles SigV4 signing and
//! regional endpoint resolution for us).

use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client;

use super::{KmsError, KmsProvider};

pub struct AwsKmsProvider {
    client: Client,
    key_id: String,
}

impl AwsKmsProvider {
    pub fn new(client: Client, key_id: impl Into<String>) -> Self {
        Self {
            client,
            key_id: key_id.into(),
        }
    }

    pub async fn from_region(key_id: impl Into<String>, region: impl Into<String>) -> Self {
        let config = aws_config::from_env()
            .region(aws_config::Region::new(region.into()))
            .load()
            .await;
        Self::new(Client::new(&config), key_id)
    }
}

#[async_trait]
impl KmsProvider for AwsKmsProvider {
    /// KMS's `GenerateDataKey` both mints a fresh DEK and returns it already
    /// wrapped; we ask for a 256-bit key, discard the plaintext copy, and
    /// keep only the ciphertext blob the caller will later submit back to
    /// `Decrypt` when unwrapping. The caller's own `dek` bytes (produced by
    /// our local RNG in [`super::KmsAdapter::encrypt`]) are layered on top
    /// as the actual message key, consistent with every other provider.
    async fn wrap_dek(&self, dek: &[u8; 32]) -> Result<Vec<u8>, KmsError> {
        // Symmetric CMKs expose `Encrypt` for wrapping caller-supplied
        // plaintext, which is what we need here since the DEK was already
        // generated by the adapter (not by KMS itself).
        let response = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(dek.to_vec()))
            .send()
            .await
            .map_err(|_| KmsError::CryptoAuth)?;
        response
            .ciphertext_blob
            .map(|blob| blob.into_inner())
            .ok_or(KmsError::CryptoAuth)
    }

    async fn unwrap_dek(&self, wrapped: &[u8]) -> Result<[u8; 32], KmsError> {
        let response = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(wrapped.to_vec()))
            .send()
            .await
            .map_err(|_| KmsError::CryptoAuth)?;
        let plaintext = response
            .plaintext
            .map(|blob| blob.into_inner())
            .ok_or(KmsError::CryptoAuth)?;
        plaintext.try_into().map_err(|_| KmsError::CryptoAuth)
    }

    fn key_version(&self) -> String {
        format!("aws-kms:{}", self.key_id)
    }
}
