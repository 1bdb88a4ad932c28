//! Link placeholder derivation and scanning.
//!
//! A placeholder is `__$` + 34 hex characters + `$__`, where the hex characters
//! are the leading 17 bytes of `keccak256` over the library's fully-qualified
//! identity string.

use alloy_primitives::keccak256;
use evm_deployer_types::{Bytecode, UnitId};
use serde::Serialize;
use std::fmt;

/// Total width of a placeholder, equal to the width of a hex-encoded address.
pub const PLACEHOLDER_LEN: usize = 40;
/// Number of hash hex characters between the delimiters.
pub const PLACEHOLDER_HASH_LEN: usize = 34;

const PREFIX: &str = "__$";
const SUFFIX: &str = "$__";

/// A `__$<hash>$__` marker as it appears in bytecode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlaceholderToken(String);

impl PlaceholderToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 34-character hash fragment between the delimiters.
    pub fn hash_fragment(&self) -> &str {
        &self.0[PREFIX.len()..PLACEHOLDER_LEN - SUFFIX.len()]
    }

    /// Lowercased form, used for lookups against derived tokens.
    pub fn normalized(&self) -> PlaceholderToken {
        PlaceholderToken(self.0.to_ascii_lowercase())
    }
}

impl fmt::Display for PlaceholderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the placeholder the compiler emits for references to `library`.
pub fn placeholder_for(library: &UnitId) -> PlaceholderToken {
    let hash = keccak256(library.as_str().as_bytes());
    let hex = hex::encode(hash.as_slice());
    PlaceholderToken(format!(
        "{PREFIX}{}{SUFFIX}",
        &hex[..PLACEHOLDER_HASH_LEN]
    ))
}

/// Every placeholder-shaped token in `code`, deduplicated, in order of first appearance.
pub fn find_placeholders(code: &Bytecode) -> Vec<PlaceholderToken> {
    let text = code.as_str();
    let bytes = text.as_bytes();
    let mut found: Vec<PlaceholderToken> = Vec::new();
    let mut pos = 0usize;

    while let Some(offset) = text[pos..].find(PREFIX) {
        let start = pos + offset;
        let end = start + PLACEHOLDER_LEN;
        if end <= bytes.len() && is_placeholder(&bytes[start..end]) {
            let token = PlaceholderToken(text[start..end].to_string());
            if !found.contains(&token) {
                found.push(token);
            }
            pos = end;
        } else {
            pos = start + 1;
        }
    }

    found
}

fn is_placeholder(window: &[u8]) -> bool {
    window.len() == PLACEHOLDER_LEN
        && window.starts_with(PREFIX.as_bytes())
        && window.ends_with(SUFFIX.as_bytes())
        && window[PREFIX.len()..PLACEHOLDER_LEN - SUFFIX.len()]
            .iter()
            .all(u8::is_ascii_hexdigit)
}
