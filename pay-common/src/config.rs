//! Process configuration, read from double-underscore-delimited env vars.
//!
//! Mirrors the teacher's `DeployEnv`: a small validated enum read once at
//! startup via `from_env`, plus a `Config` aggregate that groups the
//! recognized keys by section (`Database__*`, `Solana__*`, ...).

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, ensure, Context};

/// Which deployment this process is running as. Gates which key-management
/// providers are acceptable: `Local` is a dev convenience and must never
/// run in `Staging` or `Prod`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum DeployEnv {
    Dev,
    Staging,
    Prod,
}

impl DeployEnv {
    pub fn from_env() -> anyhow::Result<Self> {
        env::var("DEPLOY_ENVIRONMENT")
            .context("DEPLOY_ENVIRONMENT was not set")?
            .parse()
    }

    #[inline]
    pub fn is_dev(self) -> bool {
        matches!(self, Self::Dev)
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }

    /// `KeyManagement__Provider=Local` is only acceptable in `Dev`.
    pub fn validate_kms_provider(
        &self,
        provider: KmsProviderKind,
    ) -> anyhow::Result<()> {
        ensure!(
            !matches!((self, provider), (Self::Staging | Self::Prod, KmsProviderKind::Local)),
            "Staging and prod may not use the Local key management provider",
        );
        Ok(())
    }
}

impl FromStr for DeployEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "dev" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" => Ok(Self::Prod),
            _ => Err(anyhow!(
                "Unrecognized DEPLOY_ENVIRONMENT '{s}': must be 'dev', 'staging', or 'prod'"
            )),
        }
    }
}

impl fmt::Display for DeployEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `KeyManagement__Provider`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KmsProviderKind {
    Local,
    AwsKms,
    AzureKeyVault,
}

#[derive(Debug, thiserror::Error)]
#[error(
    "Unrecognized KeyManagement__Provider '{0}': \
     must be 'Local', 'AwsKms', or 'AzureKeyVault'"
)]
pub struct ParseKmsProviderKindError(String);

impl FromStr for KmsProviderKind {
    type Err = ParseKmsProviderKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Local" => Ok(Self::Local),
            "AwsKms" => Ok(Self::AwsKms),
            "AzureKeyVault" => Ok(Self::AzureKeyVault),
            _ => Err(ParseKmsProviderKindError(s.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub connection_string: String,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub connection_string: String,
}

#[derive(Clone, Debug)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub use_devnet: bool,
    pub commitment: String,
}

#[derive(Clone, Debug)]
pub enum KeyManagementConfig {
    Local {
        local_development_key_b64: String,
    },
    AzureKeyVault {
        vault_uri: String,
        key_name: String,
    },
    AwsKms {
        key_id: String,
        region: String,
    },
}

impl KeyManagementConfig {
    pub fn kind(&self) -> KmsProviderKind {
        match self {
            Self::Local { .. } => KmsProviderKind::Local,
            Self::AzureKeyVault { .. } => KmsProviderKind::AzureKeyVault,
            Self::AwsKms { .. } => KmsProviderKind::AwsKms,
        }
    }
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expiry_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub otp_requests_per_hour: u32,
    pub payments_per_minute: u32,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub deploy_env: DeployEnv,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub solana: SolanaConfig,
    pub key_management: KeyManagementConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Reads every recognized `Section__Key` env var, validating the
    /// `KeyManagement__Provider` choice against `deploy_env` along the way.
    pub fn from_env() -> anyhow::Result<Self> {
        let deploy_env = DeployEnv::from_env()?;

        let database = DatabaseConfig {
            connection_string: required_env("Database__ConnectionString")?,
        };
        let redis = RedisConfig {
            connection_string: required_env("Redis__ConnectionString")?,
        };
        let solana = SolanaConfig {
            rpc_url: required_env("Solana__RpcUrl")?,
            use_devnet: optional_env("Solana__UseDevnet")?.unwrap_or(false),
            commitment: env::var("Solana__Commitment")
                .unwrap_or_else(|_| "confirmed".to_string()),
        };

        let provider: KmsProviderKind =
            required_env("KeyManagement__Provider")?;
        deploy_env.validate_kms_provider(provider)?;
        let key_management = match provider {
            KmsProviderKind::Local => KeyManagementConfig::Local {
                local_development_key_b64: required_env(
                    "KeyManagement__LocalDevelopmentKey",
                )?,
            },
            KmsProviderKind::AzureKeyVault => {
                KeyManagementConfig::AzureKeyVault {
                    vault_uri: required_env(
                        "KeyManagement__AzureKeyVaultUri",
                    )?,
                    key_name: required_env("KeyManagement__AzureKeyName")?,
                }
            }
            KmsProviderKind::AwsKms => KeyManagementConfig::AwsKms {
                key_id: required_env("KeyManagement__AwsKmsKeyId")?,
                region: required_env("KeyManagement__AwsRegion")?,
            },
        };

        let jwt = JwtConfig {
            secret: required_env("Jwt__Secret")?,
            issuer: required_env("Jwt__Issuer")?,
            audience: required_env("Jwt__Audience")?,
            expiry_minutes: required_env("Jwt__ExpiryMinutes")?,
        };

        let rate_limit = RateLimitConfig {
            otp_requests_per_hour: optional_env(
                "RateLimit__OtpRequestsPerHour",
            )?
            .unwrap_or(5),
            payments_per_minute: optional_env(
                "RateLimit__PaymentsPerMinute",
            )?
            .unwrap_or(10),
        };

        Ok(Self {
            deploy_env,
            database,
            redis,
            solana,
            key_management,
            jwt,
            rate_limit,
        })
    }
}

fn required_env<T>(key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .with_context(|| format!("{key} was not set"))?
        .parse::<T>()
        .with_context(|| format!("{key} was set but failed to parse"))
}

fn optional_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} was set but failed to parse"))
            .map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("{key} was not valid unicode")),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deploy_env_round_trips_known_strings() {
        for s in ["dev", "staging", "prod"] {
            let parsed: DeployEnv = s.parse().unwrap();
            assert_eq!(parsed.as_str(), s);
        }
    }

    #[test]
    fn rejects_unrecognized_deploy_env() {
        assert!("production".parse::<DeployEnv>().is_err());
    }

    #[test]
    fn local_kms_forbidden_outside_dev() {
        assert!(DeployEnv::Dev
            .validate_kms_provider(KmsProviderKind::Local)
            .is_ok());
        assert!(DeployEnv::Staging
            .validate_kms_provider(KmsProviderKind::Local)
            .is_err());
        assert!(DeployEnv::Prod
            .validate_kms_provider(KmsProviderKind::Local)
            .is_err());
    }

    #[test]
    fn cloud_kms_providers_allowed_everywhere() {
        for env in [DeployEnv::Dev, DeployEnv::Staging, DeployEnv::Prod] {
            assert!(env.validate_kms_provider(KmsProviderKind::AwsKms).is_ok());
            assert!(env
                .validate_kms_provider(KmsProviderKind::AzureKeyVault)
                .is_ok());
        }
    }
}
