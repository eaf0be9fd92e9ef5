//! Topic Access Control
//!
//! Publish/subscribe authorization for device topics, built from a fixed
//! topic grammar rather than stored rules.

pub mod matcher;
pub mod patterns;
pub mod policy;

pub use matcher::TopicAccessMatcher;
pub use patterns::{Direction, TopicMatch, TopicPattern};
pub use policy::{SubscribePolicy, TopicDecision};

use crate::error::ParseError;
use crate::security::auth::WorkerCredentials;
use crate::security::identity::DeviceName;

use std::fmt;

/// Who is asking for topic access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// The privileged broker worker
    Worker,

    /// An ordinary device
    Device(DeviceName),
}

impl Principal {
    /// Resolve the principal behind a broker username.
    ///
    /// ACL callbacks only carry the username; the password was already
    /// checked when the client registered.
    pub fn from_username(username: &str, worker: &WorkerCredentials) -> Result<Self, ParseError> {
        if worker.is_enabled() && worker.is_worker(username) {
            return Ok(Principal::Worker);
        }

        Ok(Principal::Device(DeviceName::parse(username)?))
    }

    pub fn is_worker(&self) -> bool {
        matches!(self, Principal::Worker)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Worker => f.write_str("<worker>"),
            Principal::Device(device) => device.fmt(f),
        }
    }
}
