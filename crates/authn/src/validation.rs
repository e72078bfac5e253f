//! Token header checks performed before any key lookup.
//!
//! Only RS256 is accepted. Symmetric algorithms and `none` are rejected
//! outright so a token can never steer verification towards a shared secret
//! or away from a signature check. Key ids are restricted to a conservative
//! character set because they address key material in the key source.

use crate::error::AuthError;

/// Algorithms that are never accepted.
///
/// - `none`: no signature at all
/// - `HS256`, `HS384`, `HS512`: symmetric, would turn a public key into a shared secret
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Algorithms accepted for token signatures.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256"];

/// Maximum length of a key id, in bytes.
pub const MAX_KID_LEN: usize = 256;

/// Validates the `alg` header value.
///
/// # Errors
///
/// Returns [`AuthError::TokenParse`] if the algorithm is forbidden or not in
/// [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use asperitas_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::token_parse(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::token_parse(format!(
            "Algorithm '{alg}' is not in accepted list (only RS256 is supported)"
        )));
    }

    Ok(())
}

/// Validates a key id taken from a token header.
///
/// A valid kid is non-empty, at most [`MAX_KID_LEN`] bytes of printable
/// ASCII, and contains no path separators or `..`.
///
/// # Errors
///
/// Returns [`AuthError::TokenParse`] describing the first violated rule.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::token_parse("kid is empty"));
    }
    if kid.len() > MAX_KID_LEN {
        return Err(AuthError::token_parse(format!("kid exceeds {MAX_KID_LEN} bytes")));
    }
    if !kid.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(AuthError::token_parse("kid contains non-printable or non-ASCII characters"));
    }
    if kid.contains(['/', '\\']) || kid.contains("..") {
        return Err(AuthError::token_parse("kid contains a path component"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_validate_algorithm_rs256_accepted() {
        assert!(validate_algorithm("RS256").is_ok());
    }

    #[test]
    fn test_forbidden_algorithms_each_rejected_with_security_message() {
        for alg in FORBIDDEN_ALGORITHMS {
            let result = validate_algorithm(alg);
            assert!(
                matches!(result, Err(AuthError::TokenParse { ref message }) if message.contains("not allowed for security reasons")),
                "Expected security rejection for forbidden algorithm '{alg}'"
            );
        }
    }

    #[rstest]
    #[case("RS384")]
    #[case("RS512")]
    #[case("ES256")]
    #[case("EdDSA")]
    #[case("rs256")]
    #[case("")]
    fn test_validate_algorithm_not_in_list(#[case] alg: &str) {
        let result = validate_algorithm(alg);
        assert!(
            matches!(result, Err(AuthError::TokenParse { ref message }) if message.contains("not in accepted list"))
        );
    }

    #[rstest]
    #[case("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1")]
    #[case("key_2024.rotation")]
    #[case("k")]
    fn test_validate_kid_accepts(#[case] kid: &str) {
        assert!(validate_kid(kid).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("../../etc/passwd")]
    #[case("keys/primary")]
    #[case("keys\\primary")]
    #[case("a..b")]
    #[case("key id")]
    #[case("key\u{0}id")]
    #[case("clé")]
    fn test_validate_kid_rejects(#[case] kid: &str) {
        assert!(matches!(validate_kid(kid), Err(AuthError::TokenParse { .. })));
    }

    #[test]
    fn test_validate_kid_length_boundary() {
        assert!(validate_kid(&"a".repeat(MAX_KID_LEN)).is_ok());
        assert!(validate_kid(&"a".repeat(MAX_KID_LEN + 1)).is_err());
    }
}
