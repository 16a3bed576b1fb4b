//! Gateway configuration file.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cloudgate_common::{Error, Result, Secret};

use crate::auth::DEFAULT_TOKEN_TTL_MINUTES;
use crate::store::{CredentialStore, MemoryStore, SqliteStore, UserStore};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Default cap on request bodies (uploads included).
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Database file name inside the data directory.
pub const DATABASE_FILENAME: &str = "cloudgate.db";

/// Where users and credentials live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Lost on restart.
    Memory,
    Sqlite { path: PathBuf },
}

impl StoreConfig {
    /// Open the configured store.
    ///
    /// Both handles point at the same underlying store.
    pub fn open(&self) -> Result<(Arc<dyn CredentialStore>, Arc<dyn UserStore>)> {
        match self {
            StoreConfig::Memory => {
                let store = Arc::new(MemoryStore::new());
                let credentials: Arc<dyn CredentialStore> = store.clone();
                let users: Arc<dyn UserStore> = store;
                Ok((credentials, users))
            }
            StoreConfig::Sqlite { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let store = Arc::new(SqliteStore::open(path)?);
                let credentials: Arc<dyn CredentialStore> = store.clone();
                let users: Arc<dyn UserStore> = store;
                Ok((credentials, users))
            }
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HMAC secret. Left blank, a random secret is generated at startup.
    #[serde(default)]
    pub secret: Secret,
    pub ttl_minutes: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: Secret::default(),
            ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub bind: String,
    pub store: StoreConfig,
    #[serde(default)]
    pub token: TokenConfig,
    pub body_limit_bytes: usize,
}

/// Default SQLite location under the user's data directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("cloudgate"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATABASE_FILENAME)
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            store: StoreConfig::Sqlite {
                path: default_database_path(),
            },
            token: TokenConfig::default(),
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl GatewayConfig {
    /// Parsed listen address.
    ///
    /// # Errors
    /// - `Config` if the address is not `host:port`
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", self.bind, e)))
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.token.ttl_minutes <= 0 {
            return Err(Error::Config("Token TTL must be positive".to_string()));
        }
        if self.body_limit_bytes == 0 {
            return Err(Error::Config("Body limit must be positive".to_string()));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GatewayConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 5000);
        assert_eq!(config.token.ttl_minutes, 30);
    }

    #[test]
    fn test_json_shape() {
        let config = GatewayConfig {
            store: StoreConfig::Memory,
            ..GatewayConfig::default()
        };
        let value: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(value["store"], serde_json::json!({"kind": "memory"}));
        assert_eq!(value["token"]["ttl_minutes"], 30);
    }

    #[test]
    fn test_from_json_with_sqlite() {
        let json = r#"{
            "bind": "0.0.0.0:8080",
            "store": {"kind": "sqlite", "path": "/var/lib/cloudgate/gate.db"},
            "token": {"secret": "s3cr3t", "ttl_minutes": 15},
            "body_limit_bytes": 1024
        }"#;
        let config = GatewayConfig::from_json(json).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Sqlite {
                path: PathBuf::from("/var/lib/cloudgate/gate.db")
            }
        );
        assert_eq!(config.token.secret.expose(), "s3cr3t");
        assert_eq!(config.token.ttl_minutes, 15);
    }

    #[test]
    fn test_token_section_optional() {
        let json = r#"{"bind": "127.0.0.1:1", "store": {"kind": "memory"}, "body_limit_bytes": 1}"#;
        let config = GatewayConfig::from_json(json).unwrap();
        assert!(config.token.secret.is_blank());
        assert_eq!(config.token.ttl_minutes, DEFAULT_TOKEN_TTL_MINUTES);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_bind = GatewayConfig {
            bind: "localhost".to_string(),
            ..GatewayConfig::default()
        };
        assert!(matches!(bad_bind.validate(), Err(Error::Config(_))));

        let mut bad_ttl = GatewayConfig::default();
        bad_ttl.token.ttl_minutes = 0;
        assert!(matches!(bad_ttl.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            GatewayConfig::from_json("{"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cloudgate.json");
        let config = GatewayConfig {
            store: StoreConfig::Sqlite {
                path: dir.path().join("gate.db"),
            },
            ..GatewayConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(GatewayConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_open_sqlite_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreConfig::Sqlite {
            path: dir.path().join("data").join("gate.db"),
        };
        let (credentials, _) = store.open().unwrap();
        assert!(credentials
            .providers(&cloudgate_common::UserId::generate())
            .unwrap()
            .is_empty());
        assert!(dir.path().join("data").join("gate.db").exists());
    }
}
