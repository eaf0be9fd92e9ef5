//! Connection Identity Parsing
//!
//! Devices connect with a structured username and password:
//!
//! - username: `<api version>:<project id>:<product name>:<device id>`
//! - password: `<secret type>:<secret>`
//!
//! Parsing is pure and never touches the credential store, so malformed
//! credentials are rejected before any I/O happens.

use crate::error::ParseError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field delimiter shared by usernames and passwords
pub const DELIMITER: char = ':';

/// Number of fields in a v1 username
const V1_USERNAME_FIELDS: usize = 4;

/// Number of fields in a password
const PASSWORD_FIELDS: usize = 2;

/// Username format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
}

impl ApiVersion {
    /// Look up a version from its username tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "v1" => Some(ApiVersion::V1),
            _ => None,
        }
    }

    /// Tag used as the first username field
    pub fn tag(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
        }
    }

    /// Decode an already split username according to this version's layout
    fn parse_fields(self, fields: &[&str]) -> Result<DeviceName, ParseError> {
        match self {
            ApiVersion::V1 => parse_v1_fields(fields),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn parse_v1_fields(fields: &[&str]) -> Result<DeviceName, ParseError> {
    let [_, project_id, product_name, device_id] = fields else {
        return Err(ParseError::MalformedUsername);
    };

    if project_id.is_empty() || product_name.is_empty() || device_id.is_empty() {
        return Err(ParseError::MalformedUsername);
    }

    Ok(DeviceName {
        api_version: ApiVersion::V1,
        project_id: project_id.to_string(),
        product_name: product_name.to_string(),
        device_id: device_id.to_string(),
    })
}

/// Which verification path a credential takes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretType {
    /// Shared key valid for every device in a project (`p`)
    Project,

    /// Password valid for a single device (`d`)
    Device,

    /// Any other tag. Structurally valid, never authenticates.
    Other(String),
}

impl SecretType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "p" => SecretType::Project,
            "d" => SecretType::Device,
            other => SecretType::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            SecretType::Project => "p",
            SecretType::Device => "d",
            SecretType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Device addressing information carried by the username
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceName {
    pub api_version: ApiVersion,
    pub project_id: String,
    pub product_name: String,
    pub device_id: String,
}

impl DeviceName {
    /// Parse a broker username
    pub fn parse(username: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = username.split(DELIMITER).collect();

        let version = match ApiVersion::from_tag(fields[0]) {
            Some(version) => version,
            None if fields.len() == V1_USERNAME_FIELDS => {
                return Err(ParseError::UnsupportedVersion(fields[0].to_string()));
            }
            None => return Err(ParseError::MalformedUsername),
        };

        version.parse_fields(&fields)
    }
}

impl FromStr for DeviceName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceName::parse(s)
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.api_version,
            self.project_id,
            self.product_name,
            self.device_id,
            d = DELIMITER
        )
    }
}

/// Secret presented in the password field
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub secret_type: SecretType,
    pub secret: String,
}

impl Credential {
    /// Parse a broker password
    pub fn parse(password: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = password.split(DELIMITER).collect();

        let [secret_type, secret] = fields.as_slice() else {
            return Err(ParseError::MalformedPassword);
        };

        if secret_type.is_empty() || secret.is_empty() {
            return Err(ParseError::MalformedPassword);
        }

        Ok(Self {
            secret_type: SecretType::from_tag(secret_type),
            secret: secret.to_string(),
        })
    }

    /// The password exactly as the client sent it, type prefix included
    pub fn presented(&self) -> String {
        format!("{}{}{}", self.secret_type, DELIMITER, self.secret)
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret_type", &self.secret_type)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Fully parsed connection identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub device: DeviceName,
    pub credential: Credential,
}

impl Identity {
    pub fn api_version(&self) -> ApiVersion {
        self.device.api_version
    }

    pub fn project_id(&self) -> &str {
        &self.device.project_id
    }

    pub fn product_name(&self) -> &str {
        &self.device.product_name
    }

    pub fn device_id(&self) -> &str {
        &self.device.device_id
    }

    pub fn secret_type(&self) -> &SecretType {
        &self.credential.secret_type
    }

    pub fn secret(&self) -> &str {
        &self.credential.secret
    }

    /// Username under which the device's own credential is stored
    pub fn username(&self) -> String {
        self.device.to_string()
    }

    /// Re-encode into the `(username, password)` pair it was parsed from
    pub fn to_credentials(&self) -> (String, String) {
        (self.username(), self.credential.presented())
    }
}

/// Decode a connecting client's username and password.
///
/// Returns a complete [`Identity`] or a [`ParseError`], never anything in
/// between.
pub fn parse(username: &str, password: &str) -> Result<Identity, ParseError> {
    let device = DeviceName::parse(username)?;
    let credential = Credential::parse(password)?;

    Ok(Identity { device, credential })
}
