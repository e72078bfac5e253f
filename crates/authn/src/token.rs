//! Signed bearer token encoding and decoding.
//!
//! Tokens are compact RS256 JWTs whose header names the signing key:
//!
//! ```text
//! base64url({"alg":"RS256","typ":"JWT","kid":"<kid>"}) . base64url(claims) . signature
//! ```
//!
//! [`peek_kid`] reads the header without touching the signature so the
//! verifying key can be located; claims are only trusted after [`verify`]
//! (or an authentication policy) has checked the signature.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use crate::{
    claims::Claims,
    error::{AuthError, Result},
    validation::{validate_algorithm, validate_kid},
};

/// Signs `claims` with `private_pem` (PKCS#1 or PKCS#8 RSA PEM) and stamps
/// `kid` into the header.
///
/// # Errors
///
/// - [`AuthError::KeyParse`] if `private_pem` is not an RSA private key
/// - [`AuthError::Signing`] if signing fails
pub fn encode(claims: &Claims, kid: &str, private_pem: &str) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
        .map_err(|e| AuthError::key_parse(kid, e))?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_owned());

    jsonwebtoken::encode(&header, claims, &key).map_err(AuthError::signing)
}

/// Splits a compact token into its three segments.
fn segments(token: &str) -> Result<[&str; 3]> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) if !header.is_empty() => {
            Ok([header, payload, signature])
        },
        _ => Err(AuthError::token_parse("JWT must have 3 parts separated by dots")),
    }
}

/// Extracts the `kid` from the token header without verifying anything.
///
/// The header must be base64url-encoded JSON naming an accepted algorithm,
/// and the payload segment must be valid base64url. The signature segment is
/// never inspected.
///
/// # Errors
///
/// - [`AuthError::TokenParse`] if the token is not a parsable signed structure, names an
///   unaccepted algorithm, or carries an invalid kid
/// - [`AuthError::MissingKid`] if the header has no `kid`
/// - [`AuthError::KidType`] if the `kid` is not a string
pub fn peek_kid(token: &str) -> Result<String> {
    let [header, payload, _] = segments(token)?;

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::token_parse(format!("Failed to decode JWT header: {e}")))?;
    let header: Map<String, Value> = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::token_parse(format!("Failed to parse JWT header: {e}")))?;

    URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::token_parse(format!("Failed to decode JWT payload: {e}")))?;

    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::token_parse("JWT header has no algorithm"))?;
    validate_algorithm(alg)?;

    match header.get("kid") {
        None => Err(AuthError::MissingKid),
        Some(Value::String(kid)) => {
            validate_kid(kid)?;
            Ok(kid.clone())
        },
        Some(_) => Err(AuthError::KidType),
    }
}

/// Verifies the RS256 signature of `token` against `public_pem` and checks
/// its temporal validity, returning the claims.
///
/// `exp` is required; `nbf` is checked when present. `leeway` widens both
/// bounds.
///
/// # Errors
///
/// Every failure is [`AuthError::AuthenticationFailed`]; the reason is
/// logged at debug level only.
pub fn verify(token: &str, public_pem: &str, leeway: Duration) -> Result<Claims> {
    let key = DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(|e| {
        tracing::debug!(error = %e, "public key rejected");
        AuthError::AuthenticationFailed
    })?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = leeway.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "token verification failed");
            AuthError::AuthenticationFailed
        })
}

/// Decodes the claims payload without checking the signature.
///
/// Only meaningful once the token has been accepted by a verifier.
///
/// # Errors
///
/// Returns [`AuthError::TokenParse`] if the payload is not valid base64url
/// JSON claims.
pub fn decode_claims_unverified(token: &str) -> Result<Claims> {
    let [_, payload, _] = segments(token)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::token_parse(format!("Failed to decode JWT payload: {e}")))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::token_parse(format!("Failed to parse JWT claims: {e}")))
}
