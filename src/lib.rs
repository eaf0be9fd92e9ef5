pub mod config;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod security;

pub use error::{AuthHookError, ParseError, Result};
pub use config::Config;
