//! Privileged worker principal
//!
//! The broker's own management workers connect under one reserved username
//! with a shared secret taken from the environment. They do not follow the
//! device credential format and bypass per-device topic restrictions.

use crate::config::WorkerConfig;

use subtle::ConstantTimeEq;
use tracing::warn;

/// Outcome of checking a connection against the worker credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCheck {
    /// Username is not the reserved worker name
    NotWorker,
    /// Worker name and matching secret
    Accepted,
    /// Worker name with the wrong secret
    Rejected,
    /// Worker name, but no secret configured
    Disabled,
}

/// Reserved worker username plus its shared secret, if one is configured
#[derive(Clone)]
pub struct WorkerCredentials {
    username: String,
    password: Option<String>,
}

impl WorkerCredentials {
    /// An empty password is treated as unset
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password: password.filter(|p| !p.is_empty()),
        }
    }

    /// Resolve the shared secret from the environment variable named in config
    pub fn from_config(config: &WorkerConfig) -> Self {
        let password = std::env::var(&config.password_env).ok();
        let credentials = Self::new(config.username.clone(), password);

        if credentials.password.is_none() {
            warn!(
                "No {} set - privileged worker connections are disabled",
                config.password_env
            );
        }

        credentials
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Whether a username names the privileged principal
    pub fn is_worker(&self, username: &str) -> bool {
        username == self.username
    }

    pub fn check(&self, username: &str, password: &str) -> WorkerCheck {
        if !self.is_worker(username) {
            return WorkerCheck::NotWorker;
        }

        match &self.password {
            None => WorkerCheck::Disabled,
            Some(expected) if bool::from(expected.as_bytes().ct_eq(password.as_bytes())) => {
                WorkerCheck::Accepted
            }
            Some(_) => WorkerCheck::Rejected,
        }
    }
}

impl std::fmt::Debug for WorkerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCredentials")
            .field("username", &self.username)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
