//! Authentication service configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use asperitas_authn::AuthConfig;
//!
//! let config = AuthConfig::builder()
//!     .active_kid("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1")
//!     .leeway(Duration::from_secs(5))
//!     .build()
//!     .expect("valid config");
//!
//! assert!(config.validate_rule("admin-only").is_ok());
//! ```
//!
//! Deserialized configurations are validated the same way:
//!
//! ```
//! use asperitas_authn::AuthConfig;
//!
//! let config: AuthConfig = serde_json::from_str(
//!     r#"{ "active_kid": "primary", "leeway": "30s", "rules": ["admin-only"] }"#,
//! ).expect("valid config");
//! assert!(config.validate_rule("self-or-admin").is_err());
//! ```

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{policy::BUILTIN_AUTHORIZATION_RULES, validation::validate_kid};

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The active key id is not a valid kid.
    #[error("invalid active_kid: {message}")]
    InvalidActiveKid {
        /// Why the kid was rejected.
        message: String,
    },

    /// No authorization rules were declared.
    #[error("at least one authorization rule must be declared")]
    EmptyRules,

    /// A declared rule name is malformed.
    #[error("invalid rule name {rule:?}")]
    InvalidRuleName {
        /// The rejected name.
        rule: String,
    },

    /// A route uses a rule that was not declared.
    #[error("rule {rule:?} is not declared in the configuration")]
    UndeclaredRule {
        /// The rejected name.
        rule: String,
    },
}

/// Settings for [`AuthService`](crate::AuthService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAuthConfig")]
pub struct AuthConfig {
    active_kid: String,
    #[serde(with = "humantime_serde")]
    leeway: Duration,
    rules: BTreeSet<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuthConfig {
    active_kid: String,
    #[serde(with = "humantime_serde", default)]
    leeway: Duration,
    #[serde(default)]
    rules: Option<BTreeSet<String>>,
}

impl TryFrom<RawAuthConfig> for AuthConfig {
    type Error = ConfigError;

    fn try_from(raw: RawAuthConfig) -> Result<Self, Self::Error> {
        Self::builder()
            .active_kid(raw.active_kid)
            .leeway(raw.leeway)
            .maybe_rules(raw.rules)
            .build()
    }
}

fn default_rules() -> BTreeSet<String> {
    BUILTIN_AUTHORIZATION_RULES.iter().map(|rule| (*rule).to_owned()).collect()
}

#[bon::bon]
impl AuthConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Arguments
    ///
    /// * `active_kid` - Key id used to sign new tokens.
    ///
    /// # Optional Fields
    ///
    /// * `leeway` - Clock skew tolerated on `exp`/`nbf` (default: none).
    /// * `rules` - Authorization rules routes may use (default: the built-in rules).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `active_kid` is not a valid kid
    /// - `rules` is empty or contains a blank or whitespace-bearing name
    #[builder]
    pub fn new(
        #[builder(into)] active_kid: String,
        #[builder(default)] leeway: Duration,
        rules: Option<BTreeSet<String>>,
    ) -> Result<Self, ConfigError> {
        validate_kid(&active_kid)
            .map_err(|e| ConfigError::InvalidActiveKid { message: e.to_string() })?;

        let rules = rules.unwrap_or_else(default_rules);
        if rules.is_empty() {
            return Err(ConfigError::EmptyRules);
        }
        if let Some(bad) = rules.iter().find(|r| r.is_empty() || r.contains(char::is_whitespace)) {
            return Err(ConfigError::InvalidRuleName { rule: bad.clone() });
        }

        Ok(Self { active_kid, leeway, rules })
    }

    /// Returns the signing key id.
    #[must_use]
    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Returns the clock skew leeway.
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Returns the declared authorization rules.
    #[must_use]
    pub fn rules(&self) -> &BTreeSet<String> {
        &self.rules
    }

    /// Checks that a route may use `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UndeclaredRule`] if `rule` was not declared.
    pub fn validate_rule(&self, rule: &str) -> Result<(), ConfigError> {
        if self.rules.contains(rule) {
            Ok(())
        } else {
            Err(ConfigError::UndeclaredRule { rule: rule.to_owned() })
        }
    }
}
