use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub worker: WorkerConfig,
    pub acl: AclConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the webhook HTTP server binds to
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound on a single credential store round-trip
    pub timeout_ms: u64,
    /// Optional TOML snapshot used to seed the in-memory store
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Reserved username of the privileged broker worker
    pub username: String,
    /// Environment variable holding the worker's shared secret
    pub password_env: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribePolicy {
    /// Every filter in a subscribe request must pass
    AllFilters,
    /// Only the first filter is checked (legacy behaviour)
    FirstFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Require project and device in a topic to match the connected device
    pub enforce_identity_match: bool,
    pub subscribe_policy: SubscribePolicy,
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable audit logging
    pub enabled: bool,
    /// Log register (authentication) decisions
    pub log_authentication_events: bool,
    /// Log publish/subscribe decisions (can be verbose)
    pub log_authorization_events: bool,
    /// Log every failed attempt regardless of the flags above
    pub log_failed_attempts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 250,
            snapshot_path: None,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            username: "broker-worker".to_string(),
            password_env: "AUTHHOOK_WORKER_PASSWORD".to_string(),
        }
    }
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            enforce_identity_match: true,
            subscribe_policy: SubscribePolicy::AllFilters,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_authentication_events: true,
            log_authorization_events: false, // Too verbose for production
            log_failed_attempts: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            crate::error::AuthHookError::InvalidConfig(format!(
                "server.listen '{}' is not a socket address: {}",
                self.listen, e
            ))
        })
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.socket_addr()?;
        Ok(())
    }
}

impl StoreConfig {
    /// Store calls block a waiting MQTT client, so the bound stays small
    pub const MAX_TIMEOUT_MS: u64 = 5_000;

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout_ms == 0 {
            return Err(crate::error::AuthHookError::InvalidConfig(
                "store.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.timeout_ms > Self::MAX_TIMEOUT_MS {
            return Err(crate::error::AuthHookError::InvalidConfig(format!(
                "store.timeout_ms should not exceed {}",
                Self::MAX_TIMEOUT_MS
            )));
        }

        Ok(())
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.username.is_empty() {
            return Err(crate::error::AuthHookError::InvalidConfig(
                "worker.username cannot be empty".to_string(),
            ));
        }

        // A worker name in device format would shadow a real device
        if self.username.contains(crate::security::identity::DELIMITER) {
            return Err(crate::error::AuthHookError::InvalidConfig(
                "worker.username cannot contain ':'".to_string(),
            ));
        }

        if self.password_env.is_empty() {
            return Err(crate::error::AuthHookError::InvalidConfig(
                "worker.password_env cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::error::AuthHookError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.server.validate()?;
        self.store.validate()?;
        self.worker.validate()?;

        if self.logging.filter.is_empty() {
            return Err(crate::error::AuthHookError::InvalidConfig(
                "logging.filter cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
