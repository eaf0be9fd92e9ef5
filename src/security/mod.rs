//! Broker Authentication and Authorization
//!
//! Decision logic behind the broker's webhook callbacks.
//!
//! ## Key Components
//!
//! - **Identity**: parses the structured username/password into a typed identity
//! - **Store**: read-only credential lookups (project keys, device hashes, blacklist)
//! - **Authentication**: project key / device password verification with blacklisting
//! - **ACL**: topic grammar based publish/subscribe authorization
//! - **Connection**: per-connection facade over the three above
//!
//! [`SecurityManager`] is the boundary used by the webhook layer. It turns
//! every result into a [`Verdict`], records metrics and audit events, and is
//! the only place that escalates store failures to error-level logs.

pub mod acl;
pub mod audit;
pub mod auth;
pub mod connection;
pub mod identity;
pub mod store;

#[cfg(test)]
pub mod tests;

// Re-export key types for convenient access
pub use acl::{Direction, Principal, SubscribePolicy, TopicAccessMatcher, TopicDecision, TopicPattern};
pub use audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
pub use auth::{
    Argon2Verifier, AuthOutcome, Authenticator, AuthorizationProvider, IdentityProvider,
    PasswordVerifier, WorkerCheck, WorkerCredentials,
};
pub use connection::MqttConnection;
pub use identity::{ApiVersion, Credential, DeviceName, Identity, SecretType};
pub use store::{
    CredentialSnapshot, CredentialStore, DeviceCredential, InMemoryCredentialStore, ProjectKeySet,
};

use crate::config::{AuditConfig, Config};
use crate::error::{AuthHookError, Result};
use crate::metrics::HookMetrics;

use std::sync::Arc;
use tracing::{error, info, warn};

/// Denial reason for credentials that could not be parsed
pub const REASON_UNPARSEABLE: &str = "Unable to parse connection details";

/// Reason reported when the credential store could not answer
pub const REASON_STORE_UNAVAILABLE: &str = "credential store unavailable";

/// Decision handed to the webhook layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed
    Ok,

    /// Refused: bad credentials, blacklisted, or topic not permitted
    Error(String),

    /// Refused because the credential store could not be reached
    InfrastructureError(String),
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Ok => None,
            Verdict::Error(reason) | Verdict::InfrastructureError(reason) => Some(reason),
        }
    }

    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::Error(_) => "error",
            Verdict::InfrastructureError(_) => "infrastructure_error",
        }
    }

    fn audit_outcome(&self) -> AuditOutcome {
        match self {
            Verdict::Ok => AuditOutcome::Allowed,
            Verdict::Error(_) => AuditOutcome::Denied,
            Verdict::InfrastructureError(_) => AuditOutcome::InfrastructureError,
        }
    }
}

/// Coordinates parsing, authentication and topic checks for the webhook layer
pub struct SecurityManager {
    authenticator: Arc<Authenticator>,
    matcher: Arc<TopicAccessMatcher>,
    worker: WorkerCredentials,
    audit_sink: Arc<dyn AuditSink>,
    audit_config: AuditConfig,
    metrics: Arc<HookMetrics>,
}

impl SecurityManager {
    /// Create a security manager with explicit worker credentials
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        worker: WorkerCredentials,
        metrics: Arc<HookMetrics>,
    ) -> Result<Self> {
        let authenticator = Arc::new(Authenticator::new(store, &config.store, metrics.clone()));
        let matcher = Arc::new(TopicAccessMatcher::new(&config.acl)?);

        Ok(Self {
            authenticator,
            matcher,
            worker,
            audit_sink: Arc::new(TracingAuditSink),
            audit_config: config.audit.clone(),
            metrics,
        })
    }

    /// Create a security manager, reading the worker secret from the environment
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        metrics: Arc<HookMetrics>,
    ) -> Result<Self> {
        let worker = WorkerCredentials::from_config(&config.worker);
        Self::new(config, store, worker, metrics)
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn with_password_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        let authenticator = self.authenticator.as_ref().clone().with_verifier(verifier);
        self.authenticator = Arc::new(authenticator);
        self
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn matcher(&self) -> &Arc<TopicAccessMatcher> {
        &self.matcher
    }

    pub fn worker(&self) -> &WorkerCredentials {
        &self.worker
    }

    pub fn metrics(&self) -> &Arc<HookMetrics> {
        &self.metrics
    }

    /// Open the per-connection facade for a device
    pub async fn open_connection(&self, username: &str, password: &str) -> Result<MqttConnection> {
        MqttConnection::open(username, password, &self.authenticator, self.matcher.clone()).await
    }

    /// Decide a broker register (connect) callback
    pub async fn authorize_register(&self, username: &str, password: &str) -> Verdict {
        let result = match self.worker.check(username, password) {
            WorkerCheck::Accepted => {
                info!("Worker connected");
                Ok(())
            }
            WorkerCheck::Disabled => {
                warn!("Worker connection attempted but no worker secret is configured");
                Err(AuthHookError::AuthDenied {
                    reason: connection::REASON_NOT_AUTHENTICATED.to_string(),
                })
            }
            WorkerCheck::Rejected => {
                warn!("Worker connection with an invalid secret");
                Err(AuthHookError::AuthDenied {
                    reason: connection::REASON_NOT_AUTHENTICATED.to_string(),
                })
            }
            WorkerCheck::NotWorker => match self.open_connection(username, password).await {
                Ok(connection) => connection.ensure_authenticated(),
                Err(e) => Err(e),
            },
        };

        self.conclude(AuditAction::Register, username, None, result)
    }

    /// Decide a broker publish callback
    pub fn authorize_publish(&self, username: &str, topic: &str) -> Verdict {
        let result = Principal::from_username(username, &self.worker)
            .map_err(AuthHookError::from)
            .and_then(|principal| self.matcher.check_publish(&principal, topic).into_result());

        self.conclude(AuditAction::Publish, username, Some(topic.to_string()), result)
    }

    /// Decide a broker subscribe callback covering one or more topic filters
    pub fn authorize_subscribe<S: AsRef<str>>(&self, username: &str, topics: &[S]) -> Verdict {
        let result = Principal::from_username(username, &self.worker)
            .map_err(AuthHookError::from)
            .and_then(|principal| self.matcher.check_subscribe(&principal, topics).into_result());

        let detail = topics
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join(",");

        self.conclude(AuditAction::Subscribe, username, Some(detail), result)
    }

    /// Convert a decision result into a verdict, recording metrics and audit
    fn conclude(
        &self,
        action: AuditAction,
        principal: &str,
        detail: Option<String>,
        result: Result<()>,
    ) -> Verdict {
        let verdict = match result {
            Ok(()) => Verdict::Ok,
            Err(e) if e.is_infrastructure() => {
                error!(%action, principal, error = %e, "Rejecting request, credential store unavailable");
                Verdict::InfrastructureError(REASON_STORE_UNAVAILABLE.to_string())
            }
            Err(AuthHookError::Parse(e)) => {
                warn!(%action, principal, error = %e, "Error parsing connection");
                Verdict::Error(REASON_UNPARSEABLE.to_string())
            }
            Err(AuthHookError::AuthDenied { reason }) | Err(AuthHookError::TopicDenied { reason }) => {
                info!(%action, principal, %reason, "Request denied");
                Verdict::Error(reason)
            }
            Err(e) => {
                warn!(%action, principal, error = %e, "Request failed");
                Verdict::Error(e.to_string())
            }
        };

        match action {
            AuditAction::Register => self.metrics.record_register(verdict.label()),
            AuditAction::Publish => self.metrics.record_acl_check("publish", verdict.label()),
            AuditAction::Subscribe => self.metrics.record_acl_check("subscribe", verdict.label()),
        }

        let mut event = AuditEvent::new(action, principal, verdict.audit_outcome());
        let detail = match (detail, verdict.reason()) {
            (Some(detail), Some(reason)) => Some(format!("{}: {}", reason, detail)),
            (Some(detail), None) => Some(detail),
            (None, reason) => reason.map(str::to_string),
        };
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        if audit::should_record(&self.audit_config, &event) {
            self.audit_sink.record(event);
        }

        verdict
    }
}
