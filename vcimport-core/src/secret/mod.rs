//! Credential handling
//!
//! Passwords and tokens travel as [`secrecy::SecretString`] and are only
//! exposed at the point they go on the wire. Stored host passwords are
//! protected by the [`CredentialCipher`], whose parameters come from the
//! `[cipher]` settings table.

mod cipher;

pub use cipher::{CipherAlgorithm, CipherConfig, CipherEncoding, CredentialCipher, KeyDerivation};
