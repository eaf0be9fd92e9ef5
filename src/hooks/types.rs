use crate::security::Verdict;

use serde::{Deserialize, Serialize};

/// `auth_on_register` callback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub peer_addr: Option<String>,
    #[serde(default)]
    pub peer_port: Option<u16>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub mountpoint: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub clean_session: Option<bool>,
}

/// `auth_on_publish` callback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub username: String,
    pub client_id: String,
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub qos: Option<u8>,
    pub topic: String,
    /// Base64 encoded by the broker, never inspected
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub retain: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeTopic {
    pub topic: String,
    #[serde(default)]
    pub qos: u8,
}

/// `auth_on_subscribe` callback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub username: String,
    pub client_id: String,
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub topics: Vec<SubscribeTopic>,
}

impl SubscribeRequest {
    pub fn topic_filters(&self) -> Vec<&str> {
        self.topics.iter().map(|t| t.topic.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accepted {
    Ok,
}

/// Value of the `result` field: the string `"ok"` or `{"error": reason}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookResult {
    Ok(Accepted),
    Error { error: String },
}

/// Webhook reply understood by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookResponse {
    pub result: HookResult,
}

impl HookResponse {
    pub fn ok() -> Self {
        Self {
            result: HookResult::Ok(Accepted::Ok),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            result: HookResult::Error {
                error: reason.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, HookResult::Ok(_))
    }

    pub fn error_reason(&self) -> Option<&str> {
        match &self.result {
            HookResult::Ok(_) => None,
            HookResult::Error { error } => Some(error),
        }
    }
}

impl From<&Verdict> for HookResponse {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Ok => HookResponse::ok(),
            // The broker only understands ok/error; infrastructure failures
            // differ in logs and metrics, not on the wire
            Verdict::Error(reason) | Verdict::InfrastructureError(reason) => {
                HookResponse::error(reason.clone())
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body returned for requests the router rejects
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
