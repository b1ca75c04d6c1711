//! Dispatches to whichever [`KmsProvider`] the deployment's configuration
//! named, constructed once at startup per §9's "construct instances per
//! configuration, pass explicitly" (replacing a DI container with a plain
//! enum match).

use async_trait::async_trait;
use pay_core::kms::{AwsKmsProvider, AzureKeyVaultProvider, KmsError, KmsProvider, LocalDevProvider};

pub enum AnyKmsProvider {
    Local(LocalDevProvider),
    Aws(AwsKmsProvider),
    Azure(AzureKeyVaultProvider),
}

#[async_trait]
impl KmsProvider for AnyKmsProvider {
    async fn wrap_dek(&self, dek: &[u8; 32]) -> Result<Vec<u8>, KmsError> {
        match self {
            Self::Local(p) => p.wrap_dek(dek).await,
            Self::Aws(p) => p.wrap_dek(dek).await,
            Self::Azure(p) => p.wrap_dek(dek).await,
        }
    }

    async fn unwrap_dek(&self, wrapped: &[u8]) -> Result<[u8; 32], KmsError> {
        match self {
            Self::Local(p) => p.unwrap_dek(wrapped).await,
            Self::Aws(p) => p.unwrap_dek(wrapped).await,
            Self::Azure(p) => p.unwrap_dek(wrapped).await,
        }
    }

    fn key_version(&self) -> String {
        match self {
            Self::Local(p) => p.key_version(),
            Self::Aws(p) => p.key_version(),
            Self::Azure(p) => p.key_version(),
        }
    }
}
