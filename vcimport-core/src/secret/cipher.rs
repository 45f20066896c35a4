//! Credential cipher shared with the target system
//!
//! Host passwords stored in the target system are encrypted with a block
//! cipher in CBC mode, PKCS#7 padding and an all-zero IV, keyed by the
//! system-wide `ONE_KEY` token. The algorithm, the way the key is derived
//! from the token and the text encoding are all configuration.

use aes::{Aes128, Aes192, Aes256};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CredentialError, CredentialResult};

/// Block cipher used for stored credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherAlgorithm {
    /// AES-128 in CBC mode
    #[serde(rename = "aes-128-cbc")]
    Aes128Cbc,
    /// AES-192 in CBC mode
    #[serde(rename = "aes-192-cbc")]
    Aes192Cbc,
    /// AES-256 in CBC mode
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Key length in bytes
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    /// Conventional algorithm name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes192Cbc => "aes-192-cbc",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }
}

/// How the cipher key is derived from the shared token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyDerivation {
    /// First `key_len` bytes of the token; longer tokens are cut
    #[default]
    Truncate,
    /// The token must be exactly `key_len` bytes
    Exact,
}

/// Text encoding of the ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherEncoding {
    /// Standard base64; embedded whitespace and line breaks are ignored
    #[default]
    Base64,
    /// Lower or upper case hex
    Hex,
}

/// Cipher parameters, the `[cipher]` table of the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Block cipher
    pub algorithm: CipherAlgorithm,
    /// Token to key rule
    pub key_derivation: KeyDerivation,
    /// Ciphertext encoding
    pub encoding: CipherEncoding,
}

/// Encrypts and decrypts stored credentials with a shared token
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialCipher {
    config: CipherConfig,
}

const ZERO_IV: [u8; 16] = [0; 16];

impl CredentialCipher {
    /// Creates a cipher with the given parameters
    #[must_use]
    pub const fn new(config: CipherConfig) -> Self {
        Self { config }
    }

    /// Returns the cipher parameters
    #[must_use]
    pub const fn config(&self) -> &CipherConfig {
        &self.config
    }

    /// Decrypts an encoded secret
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Crypto` if the token is too short (or not
    /// exact, depending on the key derivation), the text cannot be decoded,
    /// the padding is invalid or the plaintext is not UTF-8.
    pub fn decrypt(&self, token: &SecretString, encoded: &str) -> CredentialResult<SecretString> {
        let key = self.derive_key(token)?;
        let data = self.decode(encoded)?;

        let plain = Zeroizing::new(match self.config.algorithm {
            CipherAlgorithm::Aes128Cbc => cbc::Decryptor::<Aes128>::new_from_slices(&key, &ZERO_IV)
                .map_err(|e| CredentialError::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&data),
            CipherAlgorithm::Aes192Cbc => cbc::Decryptor::<Aes192>::new_from_slices(&key, &ZERO_IV)
                .map_err(|e| CredentialError::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&data),
            CipherAlgorithm::Aes256Cbc => cbc::Decryptor::<Aes256>::new_from_slices(&key, &ZERO_IV)
                .map_err(|e| CredentialError::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&data),
        }
        .map_err(|_| {
            CredentialError::Crypto(format!(
                "{} decryption failed: invalid padding (wrong token?)",
                self.config.algorithm.name()
            ))
        })?);

        let text = std::str::from_utf8(&plain)
            .map_err(|_| CredentialError::Crypto("decrypted secret is not UTF-8".to_string()))?;
        Ok(SecretString::from(text.to_string()))
    }

    /// Encrypts a secret and encodes the ciphertext
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Crypto` if no key can be derived from the token.
    pub fn encrypt(&self, token: &SecretString, secret: &SecretString) -> CredentialResult<String> {
        let key = self.derive_key(token)?;
        let plain = secret.expose_secret().as_bytes();

        let data = match self.config.algorithm {
            CipherAlgorithm::Aes128Cbc => cbc::Encryptor::<Aes128>::new_from_slices(&key, &ZERO_IV)
                .map_err(|e| CredentialError::Crypto(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plain),
            CipherAlgorithm::Aes192Cbc => cbc::Encryptor::<Aes192>::new_from_slices(&key, &ZERO_IV)
                .map_err(|e| CredentialError::Crypto(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plain),
            CipherAlgorithm::Aes256Cbc => cbc::Encryptor::<Aes256>::new_from_slices(&key, &ZERO_IV)
                .map_err(|e| CredentialError::Crypto(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plain),
        };

        Ok(match self.config.encoding {
            CipherEncoding::Base64 => STANDARD.encode(data),
            CipherEncoding::Hex => hex::encode(data),
        })
    }

    fn derive_key(&self, token: &SecretString) -> CredentialResult<Zeroizing<Vec<u8>>> {
        let token = token.expose_secret().as_bytes();
        let len = self.config.algorithm.key_len();
        let usable = match self.config.key_derivation {
            KeyDerivation::Truncate => token.len() >= len,
            KeyDerivation::Exact => token.len() == len,
        };
        if !usable {
            return Err(CredentialError::Crypto(format!(
                "token is {} bytes but {} needs a {len}-byte key",
                token.len(),
                self.config.algorithm.name()
            )));
        }
        Ok(Zeroizing::new(token[..len].to_vec()))
    }

    fn decode(&self, encoded: &str) -> CredentialResult<Vec<u8>> {
        match self.config.encoding {
            CipherEncoding::Base64 => {
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact)
                    .map_err(|e| CredentialError::Crypto(format!("invalid base64: {e}")))
            }
            CipherEncoding::Hex => hex::decode(encoded.trim())
                .map_err(|e| CredentialError::Crypto(format!("invalid hex: {e}"))),
        }
    }
}
