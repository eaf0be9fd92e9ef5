//! Connection Facade
//!
//! One [`MqttConnection`] per connection attempt, combining the parsed
//! identity, its authentication outcome and topic checks. Opening a
//! connection parses the credentials first, so malformed input never reaches
//! the credential store.

use super::acl::{Principal, TopicAccessMatcher, TopicDecision};
use super::auth::{AuthOutcome, AuthorizationProvider, Authenticator, IdentityProvider};
use super::identity::{self, ApiVersion, Identity, SecretType};
use crate::error::{AuthHookError, Result};

use std::sync::Arc;

/// Denial reason for a credential that did not verify
pub const REASON_NOT_AUTHENTICATED: &str = "Couldn't authenticate connection details";

/// Denial reason for a blacklisted secret, project or device
pub const REASON_BLACKLISTED: &str = "User blacklisted";

pub struct MqttConnection {
    identity: Identity,
    outcome: AuthOutcome,
    matcher: Arc<TopicAccessMatcher>,
}

impl MqttConnection {
    /// Parse the credentials and authenticate them.
    ///
    /// Fails with [`AuthHookError::Parse`] before any store access when the
    /// credentials are malformed, and with [`AuthHookError::StoreUnavailable`]
    /// when the store cannot answer.
    pub async fn open(
        username: &str,
        password: &str,
        authenticator: &Authenticator,
        matcher: Arc<TopicAccessMatcher>,
    ) -> Result<Self> {
        let identity = identity::parse(username, password)?;
        let outcome = authenticator.authenticate(&identity).await?;

        Ok(Self {
            identity,
            outcome,
            matcher,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn api_version(&self) -> ApiVersion {
        self.identity.api_version()
    }

    pub fn outcome(&self) -> AuthOutcome {
        self.outcome
    }

    pub fn principal(&self) -> Principal {
        Principal::Device(self.identity.device.clone())
    }

    /// `Ok` only if the connection may proceed
    pub fn ensure_authenticated(&self) -> Result<()> {
        if self.outcome.blacklisted {
            return Err(AuthHookError::AuthDenied {
                reason: REASON_BLACKLISTED.to_string(),
            });
        }

        if !self.outcome.authenticated {
            return Err(AuthHookError::AuthDenied {
                reason: REASON_NOT_AUTHENTICATED.to_string(),
            });
        }

        Ok(())
    }

    pub fn check_publish(&self, topic: &str) -> TopicDecision {
        self.matcher.check_publish(&self.principal(), topic)
    }

    pub fn check_subscribe<S: AsRef<str>>(&self, topics: &[S]) -> TopicDecision {
        self.matcher.check_subscribe(&self.principal(), topics)
    }
}

impl IdentityProvider for MqttConnection {
    fn project_id(&self) -> &str {
        self.identity.project_id()
    }

    fn device_id(&self) -> &str {
        self.identity.device_id()
    }

    fn secret_type(&self) -> &SecretType {
        self.identity.secret_type()
    }
}

impl AuthorizationProvider for MqttConnection {
    fn authenticated(&self) -> bool {
        self.outcome.authenticated
    }

    fn blacklisted(&self) -> bool {
        self.outcome.blacklisted
    }
}

impl std::fmt::Debug for MqttConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConnection")
            .field("identity", &self.identity)
            .field("outcome", &self.outcome)
            .finish()
    }
}
