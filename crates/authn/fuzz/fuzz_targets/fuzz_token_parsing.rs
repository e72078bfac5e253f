//! Fuzz target for token header and payload parsing.
//!
//! Feeds arbitrary byte strings as tokens to the pre-verification parser,
//! the claims decoder and the header validators. Every result must be
//! either `Ok(...)` or `Err(AuthError)`.

#![no_main]

use asperitas_authn::{
    token::{decode_claims_unverified, peek_kid},
    validation::{validate_algorithm, validate_kid},
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Tokens travel in an HTTP header and are always UTF-8
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(kid) = peek_kid(token) {
        // A kid that survives peeking must satisfy the validator on its own
        assert!(validate_kid(&kid).is_ok());
    }

    let _ = decode_claims_unverified(token);

    // Segments are also plausible algorithm and kid strings
    for segment in token.split('.') {
        let _ = validate_algorithm(segment);
        let _ = validate_kid(segment);
    }
});
