/// Configuration management for vault credential resolution
use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Main credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authorization: AuthorizationConfig,
    pub logging: LoggingConfig,
}

/// Local node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Static service DID; when absent the node-info endpoint is queried
    pub service_did: Option<String>,
    /// Address of the local vault node
    pub provider_address: String,
}

/// Which persistent store backs the local caching tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    File,
    Redis,
    Memory,
}

impl FromStr for StoreKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "file" => Ok(StoreKind::File),
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => Err(VaultError::Config(format!(
                "Unknown credential store kind: {}",
                other
            ))),
        }
    }
}

/// Credential storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StoreKind,
    pub database: PathBuf,
    pub directory: PathBuf,
    pub redis_url: String,
    pub key_prefix: String,
}

/// Authorization exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Timeout for the HTTP authorization exchange in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_did: None,
                provider_address: "http://localhost:5000".to_string(),
            },
            storage: StorageConfig {
                kind: StoreKind::Sqlite,
                database: PathBuf::from("./data/credentials.sqlite"),
                directory: PathBuf::from("./data/credentials"),
                redis_url: "redis://localhost:6379".to_string(),
                key_prefix: "vault:backup-credential:".to_string(),
            },
            authorization: AuthorizationConfig {
                timeout_secs: 30,
                user_agent: default_user_agent(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Text,
            },
        }
    }
}

fn default_user_agent() -> String {
    format!("vault-credential/{}", env!("CARGO_PKG_VERSION"))
}

impl CredentialConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> VaultResult<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let service_did = env::var("VAULT_SERVICE_DID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let provider_address = env::var("VAULT_PROVIDER_ADDRESS")
            .unwrap_or(defaults.service.provider_address);

        let kind = match env::var("VAULT_CREDENTIAL_STORE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.storage.kind,
        };
        let database = env::var("VAULT_CREDENTIAL_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.database);
        let directory = env::var("VAULT_CREDENTIAL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.directory);
        let redis_url = env::var("REDIS_URL").unwrap_or(defaults.storage.redis_url);
        let key_prefix =
            env::var("VAULT_CREDENTIAL_KEY_PREFIX").unwrap_or(defaults.storage.key_prefix);

        let timeout_secs = env::var("VAULT_AUTH_TIMEOUT")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| VaultError::Config("Invalid VAULT_AUTH_TIMEOUT".to_string()))?;
        let user_agent = env::var("VAULT_USER_AGENT").unwrap_or_else(|_| default_user_agent());

        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = match env::var("VAULT_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let config = CredentialConfig {
            service: ServiceConfig {
                service_did,
                provider_address,
            },
            storage: StorageConfig {
                kind,
                database,
                directory,
                redis_url,
                key_prefix,
            },
            authorization: AuthorizationConfig {
                timeout_secs,
                user_agent,
            },
            logging: LoggingConfig { level, format },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> VaultResult<()> {
        if self.service.provider_address.trim().is_empty() {
            return Err(VaultError::Config(
                "Provider address cannot be empty".to_string(),
            ));
        }

        if self.authorization.timeout_secs == 0 {
            return Err(VaultError::Config(
                "Authorization timeout must be greater than zero".to_string(),
            ));
        }

        if self.storage.kind == StoreKind::Redis && self.storage.redis_url.is_empty() {
            return Err(VaultError::Config(
                "Redis store selected but REDIS_URL is empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CredentialConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.kind, StoreKind::Sqlite);
        assert_eq!(config.authorization.timeout_secs, 30);
    }

    #[test]
    fn test_store_kind_parsing() {
        assert_eq!("SQLite".parse::<StoreKind>().unwrap(), StoreKind::Sqlite);
        assert_eq!(" file ".parse::<StoreKind>().unwrap(), StoreKind::File);
        assert_eq!("redis".parse::<StoreKind>().unwrap(), StoreKind::Redis);
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!(matches!(
            "etcd".parse::<StoreKind>(),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = CredentialConfig::default();
        config.authorization.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_provider_rejected() {
        let mut config = CredentialConfig::default();
        config.service.provider_address = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("VAULT_SERVICE_DID", "did:elastos:node-a");
        std::env::set_var("VAULT_CREDENTIAL_STORE", "memory");
        std::env::set_var("VAULT_AUTH_TIMEOUT", "12");

        let config = CredentialConfig::from_env().unwrap();
        assert_eq!(
            config.service.service_did.as_deref(),
            Some("did:elastos:node-a")
        );
        assert_eq!(config.storage.kind, StoreKind::Memory);
        assert_eq!(config.authorization.timeout_secs, 12);

        // Cleanup
        std::env::remove_var("VAULT_SERVICE_DID");
        std::env::remove_var("VAULT_CREDENTIAL_STORE");
        std::env::remove_var("VAULT_AUTH_TIMEOUT");
    }
}
