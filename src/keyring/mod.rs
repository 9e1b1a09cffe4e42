//! Key management
//!
//! Thin boundary around the audited crypto libraries: `bip39` for phrase
//! generation and checksums, alloy's local signer for derivation, EIP-191
//! signing and public key recovery. Nothing here reimplements curve math.

mod signer;

pub use signer::SecureWallet;

use crate::{Error, Result};
use alloy::primitives::{Address, Signature};
use bip39::{Language, Mnemonic};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

/// 128 bits of entropy gives a 12-word phrase
const MNEMONIC_ENTROPY_BYTES: usize = 16;

/// Stateless facade over mnemonic and signature operations
#[derive(Debug, Clone, Copy, Default)]
pub struct Keyring;

impl Keyring {
    /// Generate a fresh 12-word English phrase.
    pub fn generate_mnemonic() -> Result<SecretString> {
        let mut entropy = [0u8; MNEMONIC_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
        Ok(SecretString::from(mnemonic.to_string()))
    }

    /// Check word list membership and checksum.
    pub fn validate_mnemonic(phrase: &str) -> Result<()> {
        Mnemonic::parse_in_normalized(Language::English, phrase.trim())
            .map(|_| ())
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))
    }

    /// Open the signer for a phrase after validating it.
    pub fn unlock(phrase: &SecretString) -> Result<SecureWallet> {
        let phrase = phrase.expose_secret().trim();
        Self::validate_mnemonic(phrase)?;
        SecureWallet::from_mnemonic(phrase)
    }

    /// Deterministic checksummed address for a phrase.
    pub fn derive_address(phrase: &SecretString) -> Result<String> {
        Ok(Self::unlock(phrase)?.address_string())
    }

    pub fn sign(phrase: &SecretString, message: &str) -> Result<Vec<u8>> {
        let wallet = Self::unlock(phrase)?;
        Ok(wallet.sign_message(message)?.to_vec())
    }

    /// Recover the signing address of an EIP-191 message.
    pub fn recover_address(message: &str, signature: &[u8]) -> Result<Address> {
        let signature = Signature::from_raw(signature)
            .map_err(|e| Error::Signing(format!("Malformed signature: {}", e)))?;
        signature
            .recover_address_from_msg(message.as_bytes())
            .map_err(|e| Error::Signing(format!("Recovery failed: {}", e)))
    }

    /// True iff `signature` over `message` recovers to `address`.
    ///
    /// Never errors: malformed input simply does not verify.
    pub fn verify(address: &str, message: &str, signature: &[u8]) -> bool {
        match Self::recover_address(message, signature) {
            Ok(recovered) => recovered.to_string().eq_ignore_ascii_case(address),
            Err(e) => {
                tracing::debug!(error = %e, "Signature did not recover");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_mnemonic, TEST_ADDRESS};

    #[test]
    fn derive_is_deterministic() {
        let a = Keyring::derive_address(&test_mnemonic()).unwrap();
        let b = Keyring::derive_address(&test_mnemonic()).unwrap();
        assert_eq!(a, TEST_ADDRESS);
        assert_eq!(a, b);
    }

    #[test]
    fn generated_phrase_is_valid_and_derives() {
        let phrase = Keyring::generate_mnemonic().unwrap();
        assert_eq!(phrase.expose_secret().split_whitespace().count(), 12);
        Keyring::validate_mnemonic(phrase.expose_secret()).unwrap();
        let address = Keyring::derive_address(&phrase).unwrap();
        assert!(crate::address::validate(&address));
    }

    #[test]
    fn rejects_bad_checksum() {
        // valid words, wrong checksum word
        let bad = SecretString::from("abandon ".repeat(12).trim_end().to_string());
        let err = Keyring::derive_address(&bad).unwrap_err();
        assert!(matches!(err, Error::InvalidMnemonic(_)));

        let err = Keyring::validate_mnemonic("not a real phrase at all").unwrap_err();
        assert!(matches!(err, Error::InvalidMnemonic(_)));
    }

    #[test]
    fn sign_verify_round_trip() {
        let phrase = test_mnemonic();
        for message in ["", "hello", "Transfer 2.000000 ETH to 0xabc from 0xdef"] {
            let signature = Keyring::sign(&phrase, message).unwrap();
            assert!(Keyring::verify(TEST_ADDRESS, message, &signature));
            assert!(Keyring::verify(&TEST_ADDRESS.to_lowercase(), message, &signature));
        }
    }

    #[test]
    fn verify_rejects_other_message_and_signer() {
        let phrase = test_mnemonic();
        let signature = Keyring::sign(&phrase, "original").unwrap();
        assert!(!Keyring::verify(TEST_ADDRESS, "tampered", &signature));
        assert!(!Keyring::verify(
            "0x0000000000000000000000000000000000000001",
            "original",
            &signature
        ));
    }

    #[test]
    fn verify_is_false_on_malformed_signature() {
        assert!(!Keyring::verify(TEST_ADDRESS, "hello", &[]));
        assert!(!Keyring::verify(TEST_ADDRESS, "hello", &[0u8; 10]));
        assert!(!Keyring::verify(TEST_ADDRESS, "hello", &[0u8; 65]));
    }
}
