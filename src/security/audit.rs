//! Security audit events
//!
//! Every hook decision can be recorded through an [`AuditSink`]. The default
//! sink writes structured events to the `audit` tracing target; deployments
//! that forward events elsewhere provide their own sink.

use crate::config::AuditConfig;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Broker action being decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Register,
    Publish,
    Subscribe,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Register => f.write_str("register"),
            AuditAction::Publish => f.write_str("publish"),
            AuditAction::Subscribe => f.write_str("subscribe"),
        }
    }
}

/// Final outcome recorded for an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Denied,
    InfrastructureError,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Allowed => f.write_str("allowed"),
            AuditOutcome::Denied => f.write_str("denied"),
            AuditOutcome::InfrastructureError => f.write_str("infrastructure_error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub principal: String,
    pub outcome: AuditOutcome,
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, principal: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            principal: principal.into(),
            outcome,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "audit",
            id = %event.id,
            timestamp = %event.timestamp.to_rfc3339(),
            action = %event.action,
            principal = %event.principal,
            outcome = %event.outcome,
            detail = event.detail.as_deref().unwrap_or(""),
            "security audit event"
        );
    }
}

/// Decide whether an event should be recorded under the given config
pub fn should_record(config: &AuditConfig, event: &AuditEvent) -> bool {
    if !config.enabled {
        return false;
    }

    let action_enabled = match event.action {
        AuditAction::Register => config.log_authentication_events,
        AuditAction::Publish | AuditAction::Subscribe => config.log_authorization_events,
    };

    // Failures are recorded even when routine events for the action are not
    action_enabled || (config.log_failed_attempts && event.outcome != AuditOutcome::Allowed)
}
