//! Structured fuzz target for token claim decoding.
//!
//! Uses the `arbitrary` crate to generate structured token-like inputs,
//! assembles base64url-encoded tokens from them and feeds them through the
//! parsing pipeline. Plausible structure reaches deeper than raw bytes.

#![no_main]

use arbitrary::Arbitrary;
use asperitas_authn::token::{decode_claims_unverified, peek_kid};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value, json};

#[derive(Debug, Arbitrary)]
struct FuzzedToken {
    alg: FuzzedAlg,
    kid: FuzzedKid,
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
    username: String,
    roles: Vec<String>,
    include_user_id: bool,
    signature_bytes: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum FuzzedAlg {
    RS256,
    None,
    HS256,
    RS512,
    Other(String),
}

impl FuzzedAlg {
    fn as_str(&self) -> &str {
        match self {
            Self::RS256 => "RS256",
            Self::None => "none",
            Self::HS256 => "HS256",
            Self::RS512 => "RS512",
            Self::Other(s) => s,
        }
    }
}

#[derive(Debug, Arbitrary)]
enum FuzzedKid {
    Absent,
    Text(String),
    Number(i64),
    Null,
}

fn build_token(input: &FuzzedToken) -> String {
    let mut header = Map::new();
    header.insert("alg".into(), Value::String(input.alg.as_str().to_owned()));
    header.insert("typ".into(), Value::String("JWT".into()));
    match &input.kid {
        FuzzedKid::Absent => {},
        FuzzedKid::Text(kid) => {
            header.insert("kid".into(), Value::String(kid.clone()));
        },
        FuzzedKid::Number(n) => {
            header.insert("kid".into(), json!(n));
        },
        FuzzedKid::Null => {
            header.insert("kid".into(), Value::Null);
        },
    }

    let mut user = Map::new();
    if input.include_user_id {
        user.insert("id".into(), Value::String(input.sub.clone()));
    }
    user.insert("username".into(), Value::String(input.username.clone()));

    let payload = json!({
        "sub": input.sub,
        "iss": input.iss,
        "iat": input.iat,
        "exp": input.exp,
        "user": user,
        "roles": input.roles,
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap_or_default());
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap_or_default());
    let sig_b64 = URL_SAFE_NO_PAD.encode(&input.signature_bytes);

    format!("{header_b64}.{payload_b64}.{sig_b64}")
}

fuzz_target!(|input: FuzzedToken| {
    let token = build_token(&input);

    let peeked = peek_kid(&token);
    if peeked.is_ok() {
        assert_eq!(input.alg.as_str(), "RS256");
        assert!(matches!(input.kid, FuzzedKid::Text(_)));
    }

    if let Ok(claims) = decode_claims_unverified(&token) {
        // Only the closed role set may survive decoding
        for role in claims.roles() {
            assert!(matches!(role.as_str(), "ADMIN" | "USER"));
        }
    }
});
