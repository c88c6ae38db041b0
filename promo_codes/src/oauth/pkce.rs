//! PKCE (RFC 7636, S256) and random token generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Unreserved characters allowed in a code verifier
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier length; the maximum RFC 7636 allows
pub const CODE_VERIFIER_LEN: usize = 128;

/// Random bytes behind `state` and session ids (256 bits)
const TOKEN_BYTES: usize = 32;

/// URL-safe random token (32 bytes, base64url without padding)
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh OAuth `state` value
pub fn new_state() -> String {
    random_token()
}

/// Fresh code verifier of [`CODE_VERIFIER_LEN`] unreserved characters
pub fn new_code_verifier() -> String {
    let mut rng = rand::rng();
    (0..CODE_VERIFIER_LEN)
        .map(|_| VERIFIER_CHARSET[rng.random_range(0..VERIFIER_CHARSET.len())] as char)
        .collect()
}

/// S256 challenge: base64url(SHA-256(verifier)) without padding
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Whether `verifier` is 43–128 unreserved characters
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=CODE_VERIFIER_LEN).contains(&verifier.len())
        && verifier.bytes().all(|b| VERIFIER_CHARSET.contains(&b))
}

/// Verifier and its derived challenge
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a new pair
    pub fn generate() -> Self {
        Self::from_verifier(new_code_verifier())
    }

    /// Derive the challenge for an existing verifier
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_shape() {
        let verifier = new_code_verifier();
        assert_eq!(verifier.len(), 128);
        assert!(is_valid_verifier(&verifier));
    }

    #[test]
    fn test_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_challenge_is_base64url() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge.len(), 43);
        assert!(!pair.challenge.contains('+'));
        assert!(!pair.challenge.contains('/'));
        assert!(!pair.challenge.contains('='));
    }

    #[test]
    fn test_state_is_url_safe_and_unique() {
        let a = new_state();
        let b = new_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.bytes()
                .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_')
        );
    }

    #[test]
    fn test_invalid_verifiers() {
        assert!(!is_valid_verifier("short"));
        assert!(!is_valid_verifier(&"a".repeat(129)));
        assert!(!is_valid_verifier(&format!("{}!", "a".repeat(50))));
    }
}
