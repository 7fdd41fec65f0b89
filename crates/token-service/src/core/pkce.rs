//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements the `S256` and `plain` code challenge methods per RFC 7636.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Code challenge transformation requested at the authorize endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMethod {
    Plain,
    S256,
}

impl ChallengeMethod {
    /// Parse `code_challenge_method`; absent means `plain` (RFC 7636 §4.3).
    #[must_use]
    pub fn parse(method: Option<&str>) -> Option<Self> {
        match method {
            None | Some("plain") => Some(Self::Plain),
            Some("S256") => Some(Self::S256),
            Some(_) => None,
        }
    }
}

/// Verify a code verifier against the stored challenge.
#[must_use]
pub fn verify(method: ChallengeMethod, code_verifier: &str, code_challenge: &str) -> bool {
    match method {
        ChallengeMethod::Plain => code_verifier == code_challenge,
        ChallengeMethod::S256 => verify_s256(code_verifier, code_challenge),
    }
}

/// Verify a PKCE S256 code challenge.
///
/// Computes `BASE64URL(SHA256(code_verifier))` and compares to the stored challenge.
#[must_use]
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    let hash = Sha256::digest(code_verifier.as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(hash);
    computed == code_challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B test vector
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_s256_valid() {
        assert!(verify(ChallengeMethod::S256, VERIFIER, CHALLENGE));
    }

    #[test]
    fn test_s256_invalid_verifier() {
        assert!(!verify_s256("wrong-verifier", CHALLENGE));
    }

    #[test]
    fn test_plain() {
        assert!(verify(ChallengeMethod::Plain, "abc", "abc"));
        assert!(!verify(ChallengeMethod::Plain, VERIFIER, CHALLENGE));
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(ChallengeMethod::parse(None), Some(ChallengeMethod::Plain));
        assert_eq!(ChallengeMethod::parse(Some("S256")), Some(ChallengeMethod::S256));
        assert_eq!(ChallengeMethod::parse(Some("s256")), None);
    }
}
