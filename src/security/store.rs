//! Credential Store Gateway
//!
//! Read-only lookups the authenticator needs from whatever owns the
//! credentials: per-project shared keys, per-device password hashes and the
//! blacklist. The core never writes through this interface.
//!
//! [`InMemoryCredentialStore`] is an injectable implementation used for
//! development deployments (seeded from a [`CredentialSnapshot`] file) and
//! tests. It is always passed around as an instance, never a global.

use crate::error::{AuthHookError, Result};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Shared keys valid for any device in a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectKeySet {
    pub project_id: String,

    /// Keys in insertion order, stored exactly as clients present them
    /// (`p:<key>`)
    pub keys: Vec<String>,
}

impl ProjectKeySet {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            keys: Vec::new(),
        }
    }

    /// Add a key, keeping the set free of duplicates
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.insert(key);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        self.keys.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Broker-native ACL pattern, kept so stored documents round-trip untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclPattern {
    pub pattern: String,
}

/// Per-device credential document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    /// Device username (`v1:<project>:<product>:<device>`)
    pub username: String,

    /// PHC-encoded password hash
    pub passhash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_acl: Option<AclPattern>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_acl: Option<AclPattern>,
}

impl DeviceCredential {
    pub fn new(username: impl Into<String>, passhash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            passhash: passhash.into(),
            client_id: None,
            mountpoint: None,
            publish_acl: None,
            subscribe_acl: None,
        }
    }
}

/// A device blacklist entry. Device ids are only unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub project_id: String,
    pub device_id: String,
}

/// Read-only credential lookups consumed by the authenticator
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Keys for a project, `None` if the project does not exist
    async fn get_project_keys(&self, project_id: &str) -> Result<Option<ProjectKeySet>>;

    /// Credential document for a device username, `None` if unknown
    async fn get_device_credential(&self, username: &str) -> Result<Option<DeviceCredential>>;

    /// Whether the secret value, the project or the device is blacklisted
    async fn is_blacklisted(&self, project_id: &str, device_id: &str, secret: &str) -> Result<bool>;
}

/// Blacklist entries as stored in a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlacklistSnapshot {
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

/// Serialized store contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    #[serde(default)]
    pub projects: Vec<ProjectKeySet>,
    #[serde(default)]
    pub devices: Vec<DeviceCredential>,
    #[serde(default)]
    pub blacklist: BlacklistSnapshot,
}

impl CredentialSnapshot {
    /// Load a snapshot from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            AuthHookError::Config(format!(
                "invalid credential snapshot {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }
}

/// Concurrent in-memory credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    projects: DashMap<String, ProjectKeySet>,
    devices: DashMap<String, DeviceCredential>,
    blacklisted_secrets: DashSet<String>,
    blacklisted_projects: DashSet<String>,
    blacklisted_devices: DashSet<DeviceRef>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from snapshot contents
    pub fn from_snapshot(snapshot: CredentialSnapshot) -> Self {
        let store = Self::new();

        for project in snapshot.projects {
            store.upsert_project(project);
        }
        for device in snapshot.devices {
            store.upsert_device(device);
        }
        for secret in snapshot.blacklist.secrets {
            store.blacklist_secret(secret);
        }
        for project_id in snapshot.blacklist.projects {
            store.blacklist_project(project_id);
        }
        for device in snapshot.blacklist.devices {
            store.blacklist_device(device.project_id, device.device_id);
        }

        info!(
            projects = store.projects.len(),
            devices = store.devices.len(),
            "Loaded credential snapshot"
        );

        store
    }

    pub fn upsert_project(&self, keys: ProjectKeySet) {
        self.projects.insert(keys.project_id.clone(), keys);
    }

    pub fn remove_project(&self, project_id: &str) -> Option<ProjectKeySet> {
        self.projects.remove(project_id).map(|(_, keys)| keys)
    }

    /// Add a single key to a project, creating the project if needed
    pub fn add_project_key(&self, project_id: &str, key: impl Into<String>) {
        self.projects
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectKeySet::new(project_id))
            .insert(key);
    }

    pub fn upsert_device(&self, credential: DeviceCredential) {
        self.devices.insert(credential.username.clone(), credential);
    }

    pub fn remove_device(&self, username: &str) -> Option<DeviceCredential> {
        self.devices.remove(username).map(|(_, credential)| credential)
    }

    pub fn blacklist_secret(&self, secret: impl Into<String>) {
        self.blacklisted_secrets.insert(secret.into());
    }

    pub fn blacklist_project(&self, project_id: impl Into<String>) {
        self.blacklisted_projects.insert(project_id.into());
    }

    pub fn blacklist_device(&self, project_id: impl Into<String>, device_id: impl Into<String>) {
        self.blacklisted_devices.insert(DeviceRef {
            project_id: project_id.into(),
            device_id: device_id.into(),
        });
    }

    pub fn clear_blacklists(&self) {
        self.blacklisted_secrets.clear();
        self.blacklisted_projects.clear();
        self.blacklisted_devices.clear();
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_project_keys(&self, project_id: &str) -> Result<Option<ProjectKeySet>> {
        Ok(self.projects.get(project_id).map(|entry| entry.value().clone()))
    }

    async fn get_device_credential(&self, username: &str) -> Result<Option<DeviceCredential>> {
        Ok(self.devices.get(username).map(|entry| entry.value().clone()))
    }

    async fn is_blacklisted(&self, project_id: &str, device_id: &str, secret: &str) -> Result<bool> {
        if self.blacklisted_secrets.contains(secret) {
            return Ok(true);
        }

        if self.blacklisted_projects.contains(project_id) {
            return Ok(true);
        }

        let device = DeviceRef {
            project_id: project_id.to_string(),
            device_id: device_id.to_string(),
        };
        Ok(self.blacklisted_devices.contains(&device))
    }
}
