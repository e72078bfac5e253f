//! Helpers shared by the integration tests.
#![allow(dead_code, clippy::expect_used)]

use std::{collections::BTreeSet, sync::Arc};

use asperitas_authn::{
    AuthConfig, AuthService, Claims, Role, User, UserId, claims::DEFAULT_TOKEN_TTL, token,
};
use asperitas_keystore::{
    KeyPair, MemoryKeyStore,
    testutil::{CountingKeySource, test_key_pair},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;

pub const PRIMARY_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

pub fn alice() -> User {
    User { id: UserId::from_u128(0xa11ce), username: "alice".into() }
}

pub fn bob() -> User {
    User { id: UserId::from_u128(0xb0b), username: "bob".into() }
}

pub fn claims_for(user: User, roles: &[Role]) -> Claims {
    Claims::for_user(user, roles.iter().copied(), DEFAULT_TOKEN_TTL)
}

/// Claims whose validity window is shifted by `offset_secs` relative to now.
pub fn claims_at(user: User, iat_offset: i64, exp_offset: i64) -> Claims {
    let now = Utc::now().timestamp();
    Claims::builder()
        .subject(user.id)
        .issuer("asperitas project")
        .issued_at(now + iat_offset)
        .expires_at(now + exp_offset)
        .user(user)
        .roles(BTreeSet::from([Role::User]))
        .build()
}

pub fn sign_with(pair: &KeyPair, kid: &str, claims: &Claims) -> String {
    let pem = pair.private_pem().expect("encode private key");
    token::encode(claims, kid, &pem).expect("sign token")
}

pub fn sign(claims: &Claims) -> String {
    sign_with(&test_key_pair(), PRIMARY_KID, claims)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Raw token with an empty signature.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

pub fn config(active_kid: &str) -> AuthConfig {
    AuthConfig::builder().active_kid(active_kid).build().expect("valid config")
}

/// A service signing with `PRIMARY_KID` over a counting wrapper of `store`.
pub fn service_over(
    store: MemoryKeyStore,
) -> (Arc<AuthService>, Arc<CountingKeySource<MemoryKeyStore>>) {
    let source = CountingKeySource::new(store);
    let service = AuthService::with_builtin_rules(config(PRIMARY_KID), source.clone());
    (Arc::new(service), source)
}
