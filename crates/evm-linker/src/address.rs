//! Address normalization utilities.
//!
//! EVM addresses are 20-byte values, but they're often represented in different formats:
//! - Checksummed: "0x9B56b45e3C3ba5Aa5E1E0BD4aD4681FD1000B2CB"
//! - Lowercase: "0x9b56b45e3c3ba5aa5e1e0bd4ad4681fd1000b2cb"
//! - Without prefix, as registries and link references often store them
//!
//! This module provides utilities to normalize addresses to a consistent format.

use alloy_primitives::Address;

/// Normalize an address to lowercase with 0x prefix and full 40 hex characters.
///
/// # Examples
///
/// ```
/// use evm_linker::address::normalize_address;
///
/// assert_eq!(
///     normalize_address("0xABC"),
///     "0x0000000000000000000000000000000000000abc"
/// );
/// assert_eq!(
///     normalize_address("24495B6Ff3C6f6D284a419BcC0B8d1793dc0D400"),
///     "0x24495b6ff3c6f6d284a419bcc0b8d1793dc0d400"
/// );
/// ```
pub fn normalize_address(addr: &str) -> String {
    let addr = addr.trim();
    let hex = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr)
        .to_lowercase();
    if hex.len() < 40 {
        format!("0x{:0>40}", hex)
    } else {
        format!("0x{}", hex)
    }
}

/// Parse an address with or without `0x`, ignoring checksum casing.
///
/// Returns `None` unless the input is exactly 40 hex characters.
pub fn parse_address(addr: &str) -> Option<Address> {
    let addr = addr.trim();
    let body = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);
    if body.len() != 40 {
        return None;
    }
    let bytes = hex::decode(body).ok()?;
    Some(Address::from_slice(&bytes))
}

/// The 40-character lowercase hex body of an address, as spliced into bytecode.
pub fn address_hex_body(addr: &Address) -> String {
    hex::encode(addr.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0x9B56b45e3C3ba5Aa5E1E0BD4aD4681FD1000B2CB"),
            "0x9b56b45e3c3ba5aa5e1e0bd4ad4681fd1000b2cb"
        );
        assert_eq!(
            normalize_address(" 0X1 "),
            "0x0000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_parse_address() {
        let parsed = parse_address("e41C5Ff7891D6e53c67a02cB64524B758d75ac09").unwrap();
        assert_eq!(
            parse_address("0xe41c5ff7891d6e53c67a02cb64524b758d75ac09"),
            Some(parsed)
        );
        assert_eq!(
            address_hex_body(&parsed),
            "e41c5ff7891d6e53c67a02cb64524b758d75ac09"
        );
        assert!(parse_address("0x1234").is_none());
        assert!(parse_address("0xzz1C5Ff7891D6e53c67a02cB64524B758d75ac09").is_none());
    }
}
