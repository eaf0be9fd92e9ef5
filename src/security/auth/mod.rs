//! Authentication Module
//!
//! Credential verification for connecting clients: project keys, device
//! password hashes, the three-axis blacklist and the privileged worker.

pub mod authentication;
pub mod password;
pub mod privileged;

pub use authentication::Authenticator;
pub use password::{Argon2Verifier, PasswordVerifier};
pub use privileged::{WorkerCheck, WorkerCredentials};

use crate::security::identity::SecretType;

/// Authentication result for one connection attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    pub authenticated: bool,
    pub blacklisted: bool,
}

impl AuthOutcome {
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            blacklisted: false,
        }
    }

    pub fn denied() -> Self {
        Self::default()
    }

    /// Blacklisted connections are never authenticated
    pub fn blacklisted() -> Self {
        Self {
            authenticated: false,
            blacklisted: true,
        }
    }
}

/// Who a connection claims to be
pub trait IdentityProvider {
    fn project_id(&self) -> &str;

    fn device_id(&self) -> &str;

    fn secret_type(&self) -> &SecretType;
}

/// Whether a connection may proceed
pub trait AuthorizationProvider {
    /// Credential verified and not blacklisted
    fn authenticated(&self) -> bool;

    /// Explicitly blacklisted on secret, project or device.
    ///
    /// This says nothing about whether the credential itself was valid.
    fn blacklisted(&self) -> bool;
}
