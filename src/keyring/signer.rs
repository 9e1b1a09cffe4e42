//! Secure wallet implementation
//!
//! SECURITY: This is the ONLY place where private keys exist.
//! - Keys are derived from the mnemonic into alloy's PrivateKeySigner
//! - Keys are never serialized to JSON
//! - Keys are never logged

use crate::{Error, Result};
use alloy::primitives::Address;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use alloy::signers::SignerSync;

/// First account on the standard Ethereum path `m/44'/60'/0'/0/{index}`
const DEFAULT_ACCOUNT_INDEX: u32 = 0;

/// Secure wallet that protects private keys
///
/// The private key is:
/// - Derived on construction and held in a PrivateKeySigner
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations
pub struct SecureWallet {
    /// The signer
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
}

impl SecureWallet {
    /// Derive the first account of a BIP39 phrase.
    ///
    /// The phrase checksum must already be validated by the caller.
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(DEFAULT_ACCOUNT_INDEX)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?
            .build()
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

        let address = signer.address();
        Ok(Self { signer, address })
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Sign an EIP-191 personal message, returning the 65-byte `r || s || v` form.
    ///
    /// This is the ONLY way to use the private key.
    pub fn sign_message(&self, message: &str) -> Result<[u8; 65]> {
        let signature = self
            .signer
            .sign_message_sync(message.as_bytes())
            .map_err(|e| Error::Signing(format!("Signing failed: {}", e)))?;
        Ok(signature.as_bytes())
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TEST_ADDRESS, TEST_MNEMONIC};

    #[test]
    fn test_wallet_from_mnemonic() {
        let wallet = SecureWallet::from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_eq!(wallet.address_string(), TEST_ADDRESS);
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = SecureWallet::from_mnemonic(TEST_MNEMONIC).unwrap();

        let debug_str = format!("{:?}", wallet);

        // Should not contain the private key
        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_signature_is_65_bytes_and_deterministic() {
        let wallet = SecureWallet::from_mnemonic(TEST_MNEMONIC).unwrap();
        let a = wallet.sign_message("hello").unwrap();
        let b = wallet.sign_message("hello").unwrap();
        assert_eq!(a.len(), 65);
        assert_eq!(a, b);
    }
}
