//! PKCE (RFC 7636) code-challenge verification. Only the `S256` method is
//! accepted; `plain` is rejected outright, per OAuth 2.1.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::digest;
use subtle::ConstantTimeEq;

/// The only code-challenge method this server accepts.
pub const REQUIRED_METHOD: &str = "S256";

/// Compute the base64url-no-pad `SHA256(code_verifier)` challenge.
pub fn challenge_from_verifier(code_verifier: &str) -> String {
    let digest = digest::digest(&digest::SHA256, code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest.as_ref())
}

/// Does `code_verifier` hash (S256) to `expected_challenge`? Comparison is
/// constant-time to avoid leaking how many leading bytes matched.
pub fn verify(code_verifier: &str, expected_challenge: &str) -> bool {
    let computed = challenge_from_verifier(code_verifier);
    computed.as_bytes().ct_eq(expected_challenge.as_bytes()).into()
}

/// Is `method` an acceptable `code_challenge_method`?
pub fn is_supported_method(method: &str) -> bool {
    method == REQUIRED_METHOD
}
