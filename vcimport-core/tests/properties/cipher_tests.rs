//! Property tests for the credential cipher

use proptest::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use vcimport_core::error::CredentialError;
use vcimport_core::secret::{CipherAlgorithm, CipherConfig, CredentialCipher};

// ========== Strategies ==========

fn arb_algorithm() -> impl Strategy<Value = CipherAlgorithm> {
    prop_oneof![
        Just(CipherAlgorithm::Aes128Cbc),
        Just(CipherAlgorithm::Aes192Cbc),
        Just(CipherAlgorithm::Aes256Cbc),
    ]
}

fn cipher(algorithm: CipherAlgorithm) -> CredentialCipher {
    CredentialCipher::new(CipherConfig {
        algorithm,
        ..CipherConfig::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: decrypt(encrypt(p)) == p for every algorithm
    #[test]
    fn round_trip(
        algorithm in arb_algorithm(),
        token in "[a-zA-Z0-9]{32,48}",
        password in "\\PC{0,64}",
    ) {
        let cipher = cipher(algorithm);
        let token = SecretString::from(token);
        let encoded = cipher
            .encrypt(&token, &SecretString::from(password.clone()))
            .unwrap();
        prop_assert_ne!(&encoded, &password);
        let decoded = cipher.decrypt(&token, &encoded).unwrap();
        prop_assert_eq!(decoded.expose_secret(), password.as_str());
    }

    /// Property: tokens shorter than the key are rejected
    #[test]
    fn short_token_is_crypto_error(algorithm in arb_algorithm(), len in 0usize..16) {
        let token = SecretString::from("k".repeat(len));
        let err = cipher(algorithm)
            .encrypt(&token, &SecretString::from("pw".to_string()))
            .unwrap_err();
        prop_assert!(matches!(err, CredentialError::Crypto(_)));
    }
}
