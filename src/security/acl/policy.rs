//! Topic Decision Types

use crate::error::AuthHookError;

pub use crate::config::SubscribePolicy;

/// Topic did not fit the grammar or was in the wrong direction
pub const REASON_NO_MATCH: &str = "topic did not match pattern";

/// Topic addresses a different project or device than the one connected
pub const REASON_FOREIGN_DEVICE: &str = "topic does not belong to this device";

/// Subscribe request carried no filters
pub const REASON_NO_TOPICS: &str = "no topics to subscribe";

/// Result of a publish or subscribe check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicDecision {
    /// Operation is allowed
    Allow,

    /// Operation is denied with reason
    Deny { reason: String },
}

impl TopicDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        TopicDecision::Deny {
            reason: reason.into(),
        }
    }

    /// Check if the decision allows the operation
    pub fn is_allowed(&self) -> bool {
        matches!(self, TopicDecision::Allow)
    }

    /// Get the denial reason if this is a deny decision
    pub fn denial_reason(&self) -> Option<&str> {
        match self {
            TopicDecision::Deny { reason } => Some(reason),
            TopicDecision::Allow => None,
        }
    }

    /// Convert into a `Result`, mapping a denial to [`AuthHookError::TopicDenied`]
    pub fn into_result(self) -> crate::Result<()> {
        match self {
            TopicDecision::Allow => Ok(()),
            TopicDecision::Deny { reason } => Err(AuthHookError::TopicDenied { reason }),
        }
    }
}
