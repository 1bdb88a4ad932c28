//! EVM Linker
//!
//! Library placeholder resolution and address normalization for EVM bytecode.
//!
//! This crate provides:
//! - [`address`]: Address normalization utilities
//! - [`placeholder`]: Derivation and scanning of `__$<hash>$__` link placeholders
//! - [`linkage`]: The [`LinkMap`] of deployed libraries and the [`resolve`] step
//!
//! # Linking
//!
//! When a contract calls into an external library, the compiler cannot know the
//! library's address. It leaves a 40-character placeholder in the bytecode:
//! `__$` + the first 34 hex characters of `keccak256("path/Lib.sol:Lib")` + `$__`.
//! Linking replaces every such placeholder with the library's deployed address
//! (40 hex characters, no `0x`), which is exactly the width of the placeholder.

pub mod address;
pub mod linkage;
pub mod placeholder;

// Re-export address utilities
pub use address::{address_hex_body, normalize_address, parse_address};
pub use linkage::{resolve, LinkConflict, LinkMap, UnresolvedReference};
pub use placeholder::{find_placeholders, placeholder_for, PlaceholderToken, PLACEHOLDER_LEN};
