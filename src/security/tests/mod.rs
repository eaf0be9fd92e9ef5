//! Cross-module security tests
//!
//! - Authentication against project keys, device hashes, blacklists and failing stores
//! - Connection facade and `SecurityManager` verdicts for every hook

pub mod test_utils;
pub mod connection_tests;

// Re-export test utilities for convenient access
pub use test_utils::*;
