//! Boundaries to the cryptographic and address-encoding collaborators.
//!
//! The synchronizer never implements curve arithmetic or address checksums itself. It
//! consumes them through [`CryptoProvider`] and [`AddressCodec`], which are injected at
//! construction time. All keys, key images and hashes are lower-case hex strings.

use crate::wallet::WalletError;

/// A public/private key pair, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyPair {
	pub public_key: String,
	pub private_key: String,
}

/// Public keys decoded from a wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressKeys {
	pub public_spend_key: String,
	pub public_view_key: String,
}

/// Private keys recovered from a mnemonic phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeys {
	pub private_spend_key: String,
	pub private_view_key: String,
}

/// Key derivation and key image primitives.
pub trait CryptoProvider: Send + Sync {
	/// Shared secret between a transaction public key and our private view key.
	fn generate_key_derivation(
		&self,
		transaction_public_key: &str,
		private_view_key: &str,
	) -> Result<String, WalletError>;

	/// Recover the public spend key an output at `output_index` was sent to.
	fn underive_public_key(
		&self,
		derivation: &str,
		output_index: u64,
		output_key: &str,
	) -> Result<String, WalletError>;

	/// Key image and private ephemeral for an owned output.
	fn generate_key_image(
		&self,
		public_spend_key: &str,
		private_spend_key: &str,
		derivation: &str,
		output_index: u64,
	) -> Result<(String, String), WalletError>;

	fn generate_key_pair(&self) -> KeyPair;

	fn secret_key_to_public_key(&self, private_key: &str) -> Result<String, WalletError>;
}

/// Address text encoding with checksum validation, and mnemonic decoding.
pub trait AddressCodec: Send + Sync {
	fn address_to_keys(&self, address: &str) -> Result<AddressKeys, WalletError>;

	fn keys_to_address(
		&self,
		public_spend_key: &str,
		public_view_key: &str,
	) -> Result<String, WalletError>;

	fn is_valid_mnemonic_word(&self, word: &str) -> bool;

	fn mnemonic_to_private_keys(&self, words: &[&str]) -> Result<PrivateKeys, WalletError>;
}

/// Validate a recovery phrase and derive its keys.
///
/// Length and word membership are checked before the codec is asked to derive anything.
pub fn validate_mnemonic(
	words: &[&str],
	codec: &dyn AddressCodec,
	expected_length: usize,
) -> Result<PrivateKeys, WalletError> {
	if words.len() != expected_length {
		return Err(WalletError::MnemonicWrongLength {
			expected: expected_length,
			actual: words.len(),
		});
	}

	if let Some(invalid) = words.iter().find(|w| !codec.is_valid_mnemonic_word(w)) {
		return Err(WalletError::MnemonicInvalidWord(invalid.to_string()));
	}

	codec.mnemonic_to_private_keys(words)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeAddressCodec;

	#[test]
	fn test_wrong_length() {
		let codec = FakeAddressCodec::default();
		let words = vec!["abbey"; 24];
		assert!(matches!(
			validate_mnemonic(&words, &codec, 25),
			Err(WalletError::MnemonicWrongLength {
				expected: 25,
				actual: 24
			})
		));
	}

	#[test]
	fn test_invalid_word_reported_before_derivation() {
		let codec = FakeAddressCodec::default();
		let mut words = vec!["abbey"; 25];
		words[7] = "zzzz";
		match validate_mnemonic(&words, &codec, 25) {
			Err(WalletError::MnemonicInvalidWord(word)) => assert_eq!(word, "zzzz"),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(codec.mnemonic_derivations(), 0);
	}

	#[test]
	fn test_valid_mnemonic_derives_keys() {
		let codec = FakeAddressCodec::default();
		let words = vec!["abbey"; 25];
		let keys = validate_mnemonic(&words, &codec, 25).unwrap();
		assert!(!keys.private_spend_key.is_empty());
		assert_eq!(codec.mnemonic_derivations(), 1);
	}
}
