//! Connection Authenticator
//!
//! Decides whether a parsed identity may connect:
//!
//! 1. Blacklist lookup on secret, project and device. A blacklisted
//!    connection is denied without looking at its credential.
//! 2. Project secrets (`p:`) must appear verbatim in the project's key set.
//! 3. Device secrets (`d:`) must verify against the device's stored hash.
//!
//! Every store round-trip is bounded by the configured timeout. A failed or
//! timed out lookup is returned as [`AuthHookError::StoreUnavailable`] so the
//! caller can reject the connection and still tell it apart from a denial.

use super::password::{Argon2Verifier, PasswordVerifier};
use super::AuthOutcome;
use crate::config::StoreConfig;
use crate::error::{AuthHookError, Result};
use crate::metrics::HookMetrics;
use crate::security::identity::{Identity, SecretType};
use crate::security::store::{CredentialStore, ProjectKeySet};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::{Choice, ConstantTimeEq};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Verifies identities against the credential store
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn PasswordVerifier>,
    store_timeout: Duration,
    metrics: Arc<HookMetrics>,
}

impl Authenticator {
    /// Create an authenticator using Argon2 for device passwords
    pub fn new(store: Arc<dyn CredentialStore>, config: &StoreConfig, metrics: Arc<HookMetrics>) -> Self {
        Self {
            store,
            verifier: Arc::new(Argon2Verifier),
            store_timeout: config.timeout(),
            metrics,
        }
    }

    /// Replace the password hash verifier
    pub fn with_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Authenticate a parsed identity
    pub async fn authenticate(&self, identity: &Identity) -> Result<AuthOutcome> {
        let start_time = Instant::now();
        let result = self.authenticate_internal(identity).await;
        self.metrics.observe_authentication(start_time.elapsed());

        if let Err(e) = &result {
            if e.is_infrastructure() {
                self.metrics.record_store_failure();
            }
        }

        result
    }

    async fn authenticate_internal(&self, identity: &Identity) -> Result<AuthOutcome> {
        let blacklisted = self
            .with_deadline(
                "is_blacklisted",
                self.store
                    .is_blacklisted(identity.project_id(), identity.device_id(), identity.secret()),
            )
            .await?;

        if blacklisted {
            info!(
                project_id = identity.project_id(),
                device_id = identity.device_id(),
                "Connection is blacklisted"
            );
            return Ok(AuthOutcome::blacklisted());
        }

        let authenticated = match identity.secret_type() {
            SecretType::Project => self.verify_project_key(identity).await?,
            SecretType::Device => self.verify_device_password(identity).await?,
            SecretType::Other(tag) => {
                debug!(secret_type = %tag, "Unknown secret type");
                false
            }
        };

        if authenticated {
            Ok(AuthOutcome::authenticated())
        } else {
            Ok(AuthOutcome::denied())
        }
    }

    async fn verify_project_key(&self, identity: &Identity) -> Result<bool> {
        let keys = self
            .with_deadline(
                "get_project_keys",
                self.store.get_project_keys(identity.project_id()),
            )
            .await?;

        let Some(keys) = keys else {
            debug!(project_id = identity.project_id(), "Unknown project");
            return Ok(false);
        };

        // Keys are stored with their type prefix, exactly as clients send them
        Ok(contains_key(&keys, &identity.credential.presented()))
    }

    async fn verify_device_password(&self, identity: &Identity) -> Result<bool> {
        let username = identity.username();
        let credential = self
            .with_deadline("get_device_credential", self.store.get_device_credential(&username))
            .await?;

        let Some(credential) = credential else {
            debug!(device = %username, "Unknown device");
            return Ok(false);
        };

        // Hash verification is CPU bound, keep it off the async workers
        let verifier = self.verifier.clone();
        let secret = identity.secret().to_string();
        let verified = tokio::task::spawn_blocking(move || {
            verifier.verify(&secret, &credential.passhash)
        })
        .await
        .map_err(|e| AuthHookError::Internal(format!("password verification task failed: {}", e)))?;

        match verified {
            Ok(matches) => Ok(matches),
            Err(e) => {
                warn!(device = %username, error = %e, "Stored password hash is unusable");
                Ok(false)
            }
        }
    }

    /// Run one store call under the configured timeout
    async fn with_deadline<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ AuthHookError::StoreUnavailable(_))) => Err(e),
            Ok(Err(e)) => Err(AuthHookError::StoreUnavailable(format!(
                "{} failed: {}",
                operation, e
            ))),
            Err(_) => Err(AuthHookError::StoreUnavailable(format!(
                "{} timed out after {}ms",
                operation,
                self.store_timeout.as_millis()
            ))),
        }
    }
}

/// Membership test that compares against every key without exiting early
fn contains_key(keys: &ProjectKeySet, presented: &str) -> bool {
    let mut found = Choice::from(0u8);
    for key in keys.iter() {
        found |= key.as_bytes().ct_eq(presented.as_bytes());
    }
    found.into()
}
