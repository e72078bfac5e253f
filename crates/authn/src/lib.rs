//! # Asperitas Authentication
//!
//! Issues and verifies RS256 bearer tokens and authorizes requests by
//! delegating to a declarative policy evaluator.
//!
//! This crate provides:
//! - **[`AuthService`]**: `generate_token`, `authenticate` and `authorize`
//! - **[`KeyCache`]**: process-wide read-through cache of public keys by kid
//! - **[`token`]**: the signed token codec
//! - **[`policy`]**: the [`PolicyEvaluator`] seam and the built-in [`RuleTable`]
//! - **[`middleware`]**: axum adapters storing [`Claims`] in request extensions
//!
//! ## Security
//!
//! - Only RS256 is accepted; `none` and HMAC algorithms are rejected before any key lookup
//! - Claims are decoded only after the token has been accepted
//! - Authentication and authorization failures carry no reason
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use asperitas_authn::{AuthConfig, AuthService, Claims, Role, User, UserId, claims::DEFAULT_TOKEN_TTL};
//! use asperitas_keystore::MemoryKeyStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::builder().active_kid("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1").build()?;
//! let service = AuthService::with_builtin_rules(config, Arc::new(MemoryKeyStore::from_dir("deploy/keys")?));
//!
//! let user = User { id: UserId::new_v4(), username: "gopher".into() };
//! let token = service.generate_token(&Claims::for_user(user, [Role::User], DEFAULT_TOKEN_TTL)).await?;
//!
//! let claims = service.authenticate(&format!("Bearer {token}")).await?;
//! service.authorize(&claims, claims.subject(), "self-or-admin").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with claims, token and service helpers and the
//!   [`assert_auth_error!`] macro.
//! - **`failpoints`**: Activates `fail` failpoints (`key-cache-before-fetch`).

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Claims data model.
pub mod claims;
/// Service configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Public key cache.
pub mod key_cache;
/// axum middleware adapters.
pub mod middleware;
/// Policy evaluation.
pub mod policy;
/// Token issuance and authentication service.
pub mod service;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Signed token codec.
pub mod token;
/// Token header validation.
pub mod validation;

pub use claims::{Claims, Role, RoleParseError, User, UserId};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, Result};
pub use key_cache::KeyCache;
pub use policy::{PolicyError, PolicyEvaluator, PolicyInput, PolicyModule, RuleTable};
pub use service::AuthService;
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
