use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthHookError>;

/// Reasons a username/password pair could not be decoded into an identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed username: expected <version>:<project>:<product>:<device>")]
    MalformedUsername,

    #[error("Malformed password: expected <secret type>:<secret>")]
    MalformedPassword,

    #[error("Unsupported api version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Error, Debug)]
pub enum AuthHookError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Authentication denied: {reason}")]
    AuthDenied { reason: String },

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Topic denied: {reason}")]
    TopicDenied { reason: String },

    #[error("Invalid password hash: {0}")]
    InvalidPasswordHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthHookError {
    /// Whether this failure comes from infrastructure rather than the caller.
    ///
    /// Infrastructure failures still deny the request, but operators need to
    /// tell them apart from a legitimate rejection.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthHookError::StoreUnavailable(_) | AuthHookError::Internal(_)
        )
    }
}
