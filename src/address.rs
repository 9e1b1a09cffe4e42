//! Account address validation
//!
//! Addresses are `0x` followed by exactly 40 hex digits. Validation is purely
//! about format; no checksum is required on input. Accepted addresses are
//! normalized to their EIP-55 checksummed spelling so that every spelling of
//! an account maps to one ledger key.

use crate::{Error, Result};
use alloy::primitives::Address;
use std::str::FromStr;

/// Required address prefix
pub const ADDRESS_PREFIX: &str = "0x";

/// Total address length including the prefix
pub const ADDRESS_LEN: usize = 42;

/// Check the address format: prefix, exact length, hex body.
pub fn validate(address: &str) -> bool {
    if address.len() != ADDRESS_LEN {
        return false;
    }
    match address.strip_prefix(ADDRESS_PREFIX) {
        Some(body) => body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Validate and return the checksummed form of an address.
pub fn normalize(address: &str) -> Result<String> {
    if !validate(address) {
        return Err(Error::InvalidAddress(address.to_string()));
    }
    let parsed = Address::from_str(address)
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))?;
    Ok(parsed.to_checksum(None))
}

/// Shorten an address for display, e.g. `0x1234...abcd`.
pub fn shorten(address: &str, chars: usize) -> String {
    if address.len() <= chars * 2 + 2 {
        return address.to_string();
    }
    format!(
        "{}...{}",
        &address[..chars + 2],
        &address[address.len() - chars..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn accepts_well_formed_addresses() {
        assert!(validate(HARDHAT_0));
        assert!(validate("0x0000000000000000000000000000000000000000"));
        assert!(validate("0xABCDEFabcdef0123456789ABCDEFabcdef012345"));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(!validate("f39Fd6e51aad88F6F4ce6aB8827279cffFb9226600"));
        assert!(!validate("0Xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!validate("0x"));
        assert!(!validate("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb9226"));
        assert!(!validate("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb922666"));
        assert!(!validate(""));
    }

    #[test]
    fn rejects_non_hex_characters() {
        assert!(!validate("0xg39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!validate("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb9226 "));
        // multi-byte chars must not slip through the length check
        assert!(!validate("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb922é"));
    }

    #[test]
    fn normalize_checksums_any_casing() {
        let lower = HARDHAT_0.to_lowercase();
        assert_eq!(normalize(&lower).unwrap(), HARDHAT_0);
        assert_eq!(normalize(&HARDHAT_0.to_uppercase().replacen("0X", "0x", 1)).unwrap(), HARDHAT_0);
    }

    #[test]
    fn normalize_rejects_invalid() {
        let err = normalize("0x1234").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }

    #[test]
    fn shorten_for_display() {
        assert_eq!(shorten(HARDHAT_0, 6), "0xf39Fd6...b92266");
        assert_eq!(shorten("0x1234", 6), "0x1234");
    }
}
