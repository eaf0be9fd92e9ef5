//! Test utilities and fixtures for security component testing
//!
//! Seeded stores, fast password hashes, store doubles that fail, stall or
//! count calls, and an audit sink that keeps what it receives.

use crate::config::{Config, StoreConfig};
use crate::error::{AuthHookError, Result};
use crate::metrics::HookMetrics;
use crate::security::audit::{AuditEvent, AuditSink};
use crate::security::auth::password::hash_password_with;
use crate::security::auth::{Authenticator, WorkerCredentials};
use crate::security::store::{
    CredentialStore, DeviceCredential, InMemoryCredentialStore, ProjectKeySet,
};
use crate::security::SecurityManager;

use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROJECT_ID: &str = "pid123";
pub const PROJECT_KEY: &str = "p:abc";
pub const DEVICE_USERNAME: &str = "v1:pid123:aircon:0xbeef";
pub const DEVICE_PASSWORD: &str = "s3cr3t";
pub const WORKER_USERNAME: &str = "broker-worker";
pub const WORKER_SECRET: &str = "worker-secret";

pub const EVT_TOPIC: &str = "/iot-2/type/device/id/v1:pid123:aircon:0xbeef/evt/boom/fmt/json";
pub const CMD_TOPIC: &str = "/iot-2/type/device/id/v1:pid123:aircon:0xbeef/cmd/boom/fmt/json";

/// Argon2id with minimal cost so hashing does not dominate test time
pub fn fast_hash(password: &str) -> String {
    let argon2 = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(1024, 1, 1, None).unwrap(),
    );
    hash_password_with(&argon2, password).unwrap()
}

/// Store with one project key and one device password
pub fn seeded_store() -> Arc<InMemoryCredentialStore> {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.upsert_project(ProjectKeySet::new(PROJECT_ID).with_key(PROJECT_KEY));
    store.upsert_device(DeviceCredential::new(DEVICE_USERNAME, fast_hash(DEVICE_PASSWORD)));
    store
}

pub fn test_authenticator(store: Arc<dyn CredentialStore>) -> (Authenticator, Arc<HookMetrics>) {
    let metrics = HookMetrics::new().unwrap();
    let authenticator = Authenticator::new(store, &StoreConfig::default(), metrics.clone());
    (authenticator, metrics)
}

pub fn authenticator_with_timeout(store: Arc<dyn CredentialStore>, timeout_ms: u64) -> Authenticator {
    let config = StoreConfig {
        timeout_ms,
        ..StoreConfig::default()
    };
    Authenticator::new(store, &config, HookMetrics::new().unwrap())
}

pub fn test_worker() -> WorkerCredentials {
    WorkerCredentials::new(WORKER_USERNAME, Some(WORKER_SECRET.to_string()))
}

pub fn test_manager(store: Arc<dyn CredentialStore>) -> SecurityManager {
    test_manager_with_config(&Config::default(), store)
}

pub fn test_manager_with_config(config: &Config, store: Arc<dyn CredentialStore>) -> SecurityManager {
    SecurityManager::new(config, store, test_worker(), HookMetrics::new().unwrap()).unwrap()
}

/// Store whose every call fails with a backend error
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn get_project_keys(&self, _project_id: &str) -> Result<Option<ProjectKeySet>> {
        Err(AuthHookError::Internal("connection reset by peer".to_string()))
    }

    async fn get_device_credential(&self, _username: &str) -> Result<Option<DeviceCredential>> {
        Err(AuthHookError::Internal("connection reset by peer".to_string()))
    }

    async fn is_blacklisted(&self, _project_id: &str, _device_id: &str, _secret: &str) -> Result<bool> {
        Err(AuthHookError::Internal("connection reset by peer".to_string()))
    }
}

/// Delegating store that waits before every answer
pub struct SlowStore {
    pub inner: Arc<InMemoryCredentialStore>,
    pub delay: Duration,
}

#[async_trait]
impl CredentialStore for SlowStore {
    async fn get_project_keys(&self, project_id: &str) -> Result<Option<ProjectKeySet>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_project_keys(project_id).await
    }

    async fn get_device_credential(&self, username: &str) -> Result<Option<DeviceCredential>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_device_credential(username).await
    }

    async fn is_blacklisted(&self, project_id: &str, device_id: &str, secret: &str) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.is_blacklisted(project_id, device_id, secret).await
    }
}

/// Delegating store that counts calls
pub struct CountingStore {
    pub inner: Arc<InMemoryCredentialStore>,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<InMemoryCredentialStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn get_project_keys(&self, project_id: &str) -> Result<Option<ProjectKeySet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_project_keys(project_id).await
    }

    async fn get_device_credential(&self, username: &str) -> Result<Option<DeviceCredential>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_device_credential(username).await
    }

    async fn is_blacklisted(&self, project_id: &str, device_id: &str, secret: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_blacklisted(project_id, device_id, secret).await
    }
}

/// Audit sink that keeps every event
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}
