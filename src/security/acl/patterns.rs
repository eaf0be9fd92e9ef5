//! Topic Patterns for ACL Matching
//!
//! Device topics follow one fixed grammar:
//!
//! ```text
//! /iot-2/type/<message type>/id/<version>:<project>:<product>:<device>/<direction>/<event>/fmt/json
//! ```
//!
//! One compiled pattern exists per direction. Matching is case-sensitive and
//! anchored at both ends.

use crate::error::{AuthHookError, Result};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message flow direction encoded in a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Device to cloud events, the publish direction
    Evt,
    /// Cloud to device commands, the subscribe direction
    Cmd,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Evt => "evt",
            Direction::Cmd => "cmd",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields captured from a matching topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMatch {
    pub message_type: String,
    pub api_version: String,
    pub project_id: String,
    pub product_name: String,
    pub device_id: String,
    pub direction: Direction,
    pub event: String,
}

/// Compiled topic matcher for a single direction
#[derive(Debug, Clone)]
pub struct TopicPattern {
    direction: Direction,
    regex: Regex,
}

impl TopicPattern {
    pub fn new(direction: Direction) -> Result<Self> {
        let source = format!(
            concat!(
                "^/iot-2/type/(?P<message_type>[^/]+)",
                "/id/(?P<api_version>[^/:]+):(?P<project_id>[^/:]+):(?P<product_name>[^/:]+):(?P<device_id>[^/:]+)",
                "/{}/(?P<event>[^/]+)/fmt/json$"
            ),
            direction.as_str()
        );

        let regex = Regex::new(&source).map_err(|e| {
            AuthHookError::Internal(format!("failed to compile {} topic pattern: {}", direction, e))
        })?;

        Ok(Self { direction, regex })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_match(&self, topic: &str) -> bool {
        self.regex.is_match(topic)
    }

    /// Match a topic and extract its fields
    pub fn captures(&self, topic: &str) -> Option<TopicMatch> {
        let caps = self.regex.captures(topic)?;
        let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

        Some(TopicMatch {
            message_type: field("message_type")?,
            api_version: field("api_version")?,
            project_id: field("project_id")?,
            product_name: field("product_name")?,
            device_id: field("device_id")?,
            direction: self.direction,
            event: field("event")?,
        })
    }
}
