//! `KmsProvider`: wraps/unwraps a 32-byte data-encryption-key (DEK) under a
//! master key that never leaves the provider's boundary.

use async_trait::async_trait;

use super::KmsError;

/// The provider's idea of "the current master key version"; persisted
/// alongside every wallet so a later rotation can target exactly the
/// wallets still on an old version.
#[async_trait]
pub trait KmsProvider: Send + Sync {
    /// Wrap (encrypt) a 32-byte DEK under the master key.
    async fn wrap_dek(&self, dek: &[u8; 32]) -> Result<Vec<u8>, KmsError>;

    /// Unwrap (decrypt) a DEK previously produced by [`wrap_dek`](Self::wrap_dek).
    async fn unwrap_dek(&self, wrapped: &[u8]) -> Result<[u8; 32], KmsError>;

    /// The provider's version id for the master key currently in use, e.g.
    /// `"local-v1"`.
    fn key_version(&self) -> String;
}
