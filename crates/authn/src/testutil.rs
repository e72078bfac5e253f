//! Shared test utilities for authentication testing.
//!
//! Helpers for building claims, signing tokens with the shared test key
//! pair, crafting raw (unsigned or malformed) tokens for attack testing and
//! wiring an [`AuthService`] over a counting key source. It is
//! feature-gated behind `testutil` to keep it out of production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! asperitas-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use asperitas_authn::testutil::{counting_service, test_claims};
//! ```

use std::sync::Arc;

use asperitas_keystore::{
    MemoryKeyStore, Zeroizing,
    testutil::{CountingKeySource, store_with_key, test_key_pair},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;

use crate::{
    claims::{Claims, DEFAULT_TOKEN_TTL, Role, User, UserId},
    config::AuthConfig,
    service::AuthService,
    token,
};

/// Key id the shared test key pair is registered under.
pub const TEST_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

/// The user behind [`test_claims`].
#[must_use]
pub fn test_user() -> User {
    User { id: UserId::from_u128(0x0123_4567_89ab_4def_8123_4567_89ab_cdef), username: "gopher".into() }
}

/// Fresh claims for [`test_user`] holding the user role.
#[must_use]
pub fn test_claims() -> Claims {
    Claims::for_user(test_user(), [Role::User], DEFAULT_TOKEN_TTL)
}

/// Fresh claims for an administrator.
#[must_use]
pub fn admin_claims() -> Claims {
    let admin = User { id: UserId::from_u128(0xad), username: "admin".into() };
    Claims::for_user(admin, [Role::Admin, Role::User], DEFAULT_TOKEN_TTL)
}

/// Claims for [`test_user`] that expired an hour ago.
#[must_use]
pub fn expired_claims() -> Claims {
    let now = Utc::now().timestamp();
    let user = test_user();
    Claims::builder()
        .subject(user.id)
        .issuer(crate::claims::DEFAULT_ISSUER)
        .issued_at(now - 7200)
        .expires_at(now - 3600)
        .user(user)
        .roles([Role::User].into_iter().collect())
        .build()
}

/// PKCS#1 PEM of the shared test private key.
///
/// # Panics
///
/// Panics if PEM encoding fails.
#[must_use]
pub fn test_private_pem() -> Zeroizing<String> {
    test_key_pair().private_pem().expect("encode test private key")
}

/// PKIX PEM of the shared test public key.
///
/// # Panics
///
/// Panics if PEM encoding fails.
#[must_use]
pub fn test_public_pem() -> String {
    test_key_pair().public_pem().expect("encode test public key")
}

/// Signs `claims` with the shared test key under [`TEST_KID`].
///
/// # Panics
///
/// Panics if signing fails.
#[must_use]
pub fn sign(claims: &Claims) -> String {
    token::encode(claims, TEST_KID, &test_private_pem()).expect("sign test token")
}

/// Formats `token` as an `Authorization` header value.
#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Creates a raw token from arbitrary header and payload JSON.
///
/// The result has the shape `{header_b64}.{payload_b64}.` with an empty
/// signature, for testing rejection of malformed or forged tokens.
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Configuration signing with [`TEST_KID`] and the built-in rules.
///
/// # Panics
///
/// Panics if the configuration is rejected.
#[must_use]
pub fn test_config() -> AuthConfig {
    AuthConfig::builder().active_kid(TEST_KID).build().expect("test config")
}

/// An [`AuthService`] with the built-in rules over a counting source that
/// holds the test key pair under [`TEST_KID`].
#[must_use]
pub fn counting_service() -> (AuthService, Arc<CountingKeySource<MemoryKeyStore>>) {
    let source = CountingKeySource::new(store_with_key(TEST_KID));
    let service = AuthService::with_builtin_rules(test_config(), source.clone());
    (service, source)
}

/// Asserts that a [`Result<T, AuthError>`](crate::AuthError) is an `Err`
/// matching the given variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use asperitas_authn::assert_auth_error;
/// use asperitas_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::MissingKid);
/// assert_auth_error!(result, MissingKid);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            result,
        );
    }};
    ($result:expr, $variant:ident, $msg:expr) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            result,
        );
    }};
}
