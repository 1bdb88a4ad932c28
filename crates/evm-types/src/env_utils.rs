//! Environment variable parsing utilities.
//!
//! Deployment overrides read from the environment (or a `.env` file loaded by
//! the CLI). Values set here win over the deployment spec.
//!
//! # Example
//!
//! ```
//! use evm_deployer_types::env_utils::{env_var, ORACLE_BACKDATE_ENV};
//!
//! let backdate: u64 = env_var(ORACLE_BACKDATE_ENV).unwrap_or(60);
//! ```

use std::str::FromStr;

/// RPC endpoint override.
pub const RPC_URL_ENV: &str = "EVM_DEPLOY_RPC_URL";
/// Sender account override.
pub const SENDER_ENV: &str = "EVM_DEPLOY_SENDER";
/// Deployment ledger location override.
pub const STATE_FILE_ENV: &str = "EVM_DEPLOY_STATE_FILE";
/// Hex private key for local signing. Never read from the spec file.
pub const PRIVATE_KEY_ENV: &str = "EVM_DEPLOY_PRIVATE_KEY";
/// Expected chain id override.
pub const CHAIN_ID_ENV: &str = "EVM_DEPLOY_CHAIN_ID";
/// Oracle timestamp backdate override, in seconds.
pub const ORACLE_BACKDATE_ENV: &str = "EVM_DEPLOY_ORACLE_BACKDATE";
/// Submit wave units one at a time when truthy.
pub const SEQUENTIAL_ENV: &str = "EVM_DEPLOY_SEQUENTIAL";

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Check if an environment variable is set to a truthy value.
///
/// Returns `true` if the variable is set to "1", "true", "yes", or "on" (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get a non-empty environment variable as a string.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_parsing() {
        std::env::set_var("EVM_TYPES_TEST_U64", " 42 ");
        std::env::set_var("EVM_TYPES_TEST_BAD_U64", "forty");
        assert_eq!(env_var::<u64>("EVM_TYPES_TEST_U64"), Some(42));
        assert_eq!(env_var::<u64>("EVM_TYPES_TEST_BAD_U64"), None);
        assert_eq!(env_var::<u64>("EVM_TYPES_NONEXISTENT_1"), None);
        std::env::remove_var("EVM_TYPES_TEST_U64");
        std::env::remove_var("EVM_TYPES_TEST_BAD_U64");
    }

    #[test]
    fn test_env_bool() {
        std::env::set_var("EVM_TYPES_TEST_BOOL_YES", "YES");
        std::env::set_var("EVM_TYPES_TEST_BOOL_NO", "false");

        assert!(env_bool("EVM_TYPES_TEST_BOOL_YES"));
        assert!(!env_bool("EVM_TYPES_TEST_BOOL_NO"));
        assert!(!env_bool("EVM_TYPES_NONEXISTENT_2"));

        std::env::remove_var("EVM_TYPES_TEST_BOOL_YES");
        std::env::remove_var("EVM_TYPES_TEST_BOOL_NO");
    }

    #[test]
    fn test_env_string_ignores_blank() {
        std::env::set_var("EVM_TYPES_TEST_EMPTY", "   ");
        std::env::set_var("EVM_TYPES_TEST_URL", " http://localhost:8545 ");
        assert_eq!(env_string("EVM_TYPES_TEST_EMPTY"), None);
        assert_eq!(
            env_string("EVM_TYPES_TEST_URL").as_deref(),
            Some("http://localhost:8545")
        );
        std::env::remove_var("EVM_TYPES_TEST_EMPTY");
        std::env::remove_var("EVM_TYPES_TEST_URL");
    }
}
