//! The `AzureKeyVault` provider: RSA-OAEP-256 wrapping of the DEK via Key
//! Vault's `wrapKey`/`unwrapKey` REST operations.
//!
//! Mirrors the chain client's shape (C3): a thin typed facade over an HTTP
//! API, each method building a request and mapping transport/API failures
//! to [`KmsError`] with `anyhow::Context` for the diagnostic trail.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use super::{KmsError, KmsProvider};

const WRAP_ALGORITHM: &str = "RSA-OAEP-256";

pub struct AzureKeyVaultProvider {
    http: reqwest::Client,
    vault_uri: String,
    key_name: String,
    key_version: String,
    /// Bearer token for Key Vault's `https://vault.azure.net` audience.
    /// Acquired out-of-band (managed identity, client credentials) and
    /// refreshed by the caller; this adapter only ever reads it.
    access_token: String,
}

impl AzureKeyVaultProvider {
    pub fn new(
        vault_uri: impl Into<String>,
        key_name: impl Into<String>,
        key_version: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            vault_uri: vault_uri.into(),
            key_name: key_name.into(),
            key_version: key_version.into(),
            access_token: access_token.into(),
        }
    }

    fn key_op_url(&self, op: &str) -> String {
        format!(
            "{}/keys/{}/{}/{}?api-version=7.4",
            self.vault_uri.trim_end_matches('/'),
            self.key_name,
            self.key_version,
            op
        )
    }

    async fn call(&self, op: &str, value_b64url: &str) -> anyhow::Result<String> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            alg: &'a str,
            value: &'a str,
        }
        #[derive(Deserialize)]
        struct Response {
            value: String,
        }

        let response = self
            .http
            .post(self.key_op_url(op))
            .bearer_auth(&self.access_token)
            .json(&Body {
                alg: WRAP_ALGORITHM,
                value: value_b64url,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?;
        Ok(response.value)
    }
}

#[async_trait]
impl KmsProvider for AzureKeyVaultProvider {
    async fn wrap_dek(&self, dek: &[u8; 32]) -> Result<Vec<u8>, KmsError> {
        let value = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(dek);
        let wrapped_b64url = self
            .call("wrapkey", &value)
            .await
            .map_err(|_| KmsError::CryptoAuth)?;
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(wrapped_b64url)
            .map_err(|_| KmsError::CryptoAuth)
    }

    async fn unwrap_dek(&self, wrapped: &[u8]) -> Result<[u8; 32], KmsError> {
        let value = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(wrapped);
        let dek_b64url = self
            .call("unwrapkey", &value)
            .await
            .map_err(|_| KmsError::CryptoAuth)?;
        let dek = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(dek_b64url)
            .map_err(|_| KmsError::CryptoAuth)?;
        dek.try_into().map_err(|_| KmsError::CryptoAuth)
    }

    fn key_version(&self) -> String {
        format!("azure:{}:{}", self.key_name, self.key_version)
    }
}
