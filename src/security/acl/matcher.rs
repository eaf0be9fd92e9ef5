//! Topic Access Matcher
//!
//! Decides whether a principal may publish to or subscribe to a topic.
//! Devices publish only on `evt` topics and subscribe only on `cmd` topics;
//! by default the project and device in the topic must also be their own.
//! The privileged worker skips all of this.

use super::patterns::{Direction, TopicPattern};
use super::policy::{
    SubscribePolicy, TopicDecision, REASON_FOREIGN_DEVICE, REASON_NO_MATCH, REASON_NO_TOPICS,
};
use super::Principal;
use crate::config::AclConfig;
use crate::error::Result;
use crate::security::identity::DeviceName;

use tracing::debug;

/// Stateless publish/subscribe decision engine, shared across requests
#[derive(Debug, Clone)]
pub struct TopicAccessMatcher {
    publish: TopicPattern,
    subscribe: TopicPattern,
    enforce_identity_match: bool,
    subscribe_policy: SubscribePolicy,
}

impl TopicAccessMatcher {
    pub fn new(config: &AclConfig) -> Result<Self> {
        Ok(Self {
            publish: TopicPattern::new(Direction::Evt)?,
            subscribe: TopicPattern::new(Direction::Cmd)?,
            enforce_identity_match: config.enforce_identity_match,
            subscribe_policy: config.subscribe_policy,
        })
    }

    pub fn enforces_identity_match(&self) -> bool {
        self.enforce_identity_match
    }

    pub fn subscribe_policy(&self) -> SubscribePolicy {
        self.subscribe_policy
    }

    pub fn check_publish(&self, principal: &Principal, topic: &str) -> TopicDecision {
        match principal {
            Principal::Worker => TopicDecision::Allow,
            Principal::Device(device) => self.check_device_topic(&self.publish, device, topic),
        }
    }

    /// Check every filter of a subscribe request according to the configured policy
    pub fn check_subscribe<S: AsRef<str>>(&self, principal: &Principal, topics: &[S]) -> TopicDecision {
        let device = match principal {
            Principal::Worker => return TopicDecision::Allow,
            Principal::Device(device) => device,
        };

        let Some(first) = topics.first() else {
            return TopicDecision::deny(REASON_NO_TOPICS);
        };

        match self.subscribe_policy {
            SubscribePolicy::FirstFilter => {
                self.check_device_topic(&self.subscribe, device, first.as_ref())
            }
            SubscribePolicy::AllFilters => {
                for topic in topics {
                    let decision = self.check_device_topic(&self.subscribe, device, topic.as_ref());
                    if !decision.is_allowed() {
                        return decision;
                    }
                }
                TopicDecision::Allow
            }
        }
    }

    fn check_device_topic(&self, pattern: &TopicPattern, device: &DeviceName, topic: &str) -> TopicDecision {
        let Some(matched) = pattern.captures(topic) else {
            debug!(
                device = %device,
                topic,
                direction = %pattern.direction(),
                "Topic did not match pattern"
            );
            return TopicDecision::deny(REASON_NO_MATCH);
        };

        if self.enforce_identity_match
            && (matched.project_id != device.project_id || matched.device_id != device.device_id)
        {
            debug!(device = %device, topic, "Topic addresses another device");
            return TopicDecision::deny(REASON_FOREIGN_DEVICE);
        }

        TopicDecision::Allow
    }
}
