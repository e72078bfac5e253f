//! Token issuance, authentication and authorization.
//!
//! ```text
//! authenticate("Bearer <token>")
//!   → split header                      MalformedHeader
//!   → peek kid (no signature check)     TokenParse / MissingKid / KidType
//!   → KeyCache::lookup(kid)             KeyLookup
//!   → policy authentication/authenticate
//!   → decode claims                     AuthenticationFailed
//!
//! authorize(claims, user_id, rule)
//!   → policy authorization/<rule>       AuthorizationFailed
//! ```
//!
//! Claims are decoded only once the policy has accepted the token, so no
//! code path observes unverified claims.

use std::{fmt, sync::Arc};

use asperitas_keystore::KeySource;

use crate::{
    claims::{Claims, UserId},
    config::AuthConfig,
    error::{AuthError, Result},
    key_cache::KeyCache,
    policy::{PolicyEvaluator, PolicyInput, PolicyModule, RULE_AUTHENTICATE, RuleTable},
    token,
};

/// Issues and checks bearer tokens.
///
/// Constructed once at start-up and shared behind an [`Arc`]; all methods
/// take `&self` and may be called concurrently.
pub struct AuthService {
    config: AuthConfig,
    key_source: Arc<dyn KeySource>,
    key_cache: KeyCache,
    policy: Arc<dyn PolicyEvaluator>,
}

impl AuthService {
    /// Creates a service over `key_source`, delegating decisions to `policy`.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        key_source: Arc<dyn KeySource>,
        policy: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        let key_cache = KeyCache::new(Arc::clone(&key_source));
        Self { config, key_source, key_cache, policy }
    }

    /// Creates a service using the built-in [`RuleTable`] with the
    /// configured leeway.
    #[must_use]
    pub fn with_builtin_rules(config: AuthConfig, key_source: Arc<dyn KeySource>) -> Self {
        let policy = Arc::new(RuleTable::with_leeway(config.leeway()));
        Self::new(config, key_source, policy)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Returns the key id new tokens are signed with.
    #[must_use]
    pub fn active_kid(&self) -> &str {
        self.config.active_kid()
    }

    /// Returns the public key cache.
    #[must_use]
    pub fn key_cache(&self) -> &KeyCache {
        &self.key_cache
    }

    /// Signs `claims` with the active private key.
    ///
    /// The private key is fetched from the key source on every call and
    /// dropped (zeroized) before returning.
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeyLookup`] if the key source fails
    /// - [`AuthError::KeyParse`] if the private key is malformed
    /// - [`AuthError::Signing`] if signing fails
    #[tracing::instrument(skip(self, claims), fields(kid = %self.active_kid(), sub = %claims.subject()))]
    pub async fn generate_token(&self, claims: &Claims) -> Result<String> {
        let kid = self.active_kid();
        let private_pem = self.key_source.private_key_pem(kid).await.map_err(|err| {
            tracing::warn!(error = %err, "private key lookup failed");
            AuthError::key_lookup(kid, err)
        })?;

        let token = token::encode(claims, kid, &private_pem)?;
        tracing::debug!("token issued");
        Ok(token)
    }

    /// Authenticates an `Authorization` header value of the form
    /// `Bearer <token>` and returns the verified claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedHeader`] if the value is not `Bearer <token>`
    /// - [`AuthError::TokenParse`], [`AuthError::MissingKid`] or [`AuthError::KidType`] if the
    ///   token header is unusable; no key lookup is attempted
    /// - [`AuthError::KeyLookup`] if no public key exists for the kid
    /// - [`AuthError::AuthenticationFailed`] if the policy rejects the token, fails to evaluate,
    ///   or the accepted token carries undecodable claims
    #[tracing::instrument(skip_all, fields(kid))]
    pub async fn authenticate(&self, bearer: &str) -> Result<Claims> {
        let token = parse_bearer(bearer)?;
        let kid = token::peek_kid(token)?;
        tracing::Span::current().record("kid", kid.as_str());

        let key = self.key_cache.lookup(&kid).await?;

        let input = PolicyInput::Authentication { key: &key, token };
        match self.policy.evaluate(PolicyModule::Authentication, RULE_AUTHENTICATE, &input).await {
            Ok(true) => {},
            Ok(false) => {
                tracing::debug!("token rejected by policy");
                return Err(AuthError::AuthenticationFailed);
            },
            Err(err) => {
                tracing::warn!(error = %err, "authentication policy evaluation failed");
                return Err(AuthError::AuthenticationFailed);
            },
        }

        token::decode_claims_unverified(token).map_err(|err| {
            tracing::warn!(error = %err, "accepted token carries undecodable claims");
            AuthError::AuthenticationFailed
        })
    }

    /// Decides whether the holder of `claims` may act on `user_id` under
    /// the authorization `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthorizationFailed`] if the policy denies, does
    /// not know `rule`, or fails to evaluate.
    #[tracing::instrument(skip(self, claims), fields(sub = %claims.subject()))]
    pub async fn authorize(&self, claims: &Claims, user_id: UserId, rule: &str) -> Result<()> {
        let input = PolicyInput::Authorization {
            roles: claims.roles(),
            subject: claims.subject(),
            user_id,
        };

        match self.policy.evaluate(PolicyModule::Authorization, rule, &input).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::debug!("access denied by policy");
                Err(AuthError::AuthorizationFailed)
            },
            Err(err) => {
                tracing::warn!(error = %err, "authorization policy evaluation failed");
                Err(AuthError::AuthorizationFailed)
            },
        }
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .field("key_cache", &self.key_cache)
            .finish_non_exhaustive()
    }
}

/// Extracts the token from `Bearer <token>`.
///
/// The value must split on single spaces into exactly two parts, the first
/// being `Bearer`. An empty token is left for the token parser to reject.
fn parse_bearer(value: &str) -> Result<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use asperitas_keystore::{KeyError, MemoryKeyStore, testutil::CountingKeySource};
    use rstest::rstest;

    use super::*;
    use crate::{
        assert_auth_error,
        policy::{PolicyError, RULE_ADMIN_ONLY, RULE_SELF_OR_ADMIN},
        testutil::{TEST_KID, admin_claims, bearer, counting_service, test_claims, test_config},
    };

    #[rstest]
    #[case::empty("")]
    #[case::scheme_only("Bearer")]
    #[case::wrong_scheme("Basic abc")]
    #[case::lowercase_scheme("bearer abc")]
    #[case::three_parts("Bearer abc def")]
    #[case::double_space("Bearer  abc")]
    fn test_parse_bearer_rejects(#[case] value: &str) {
        assert_auth_error!(parse_bearer(value), MalformedHeader);
    }

    #[test]
    fn test_parse_bearer_empty_token_passes_through() {
        assert_eq!(parse_bearer("Bearer ").unwrap(), "");
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (service, _) = counting_service();
        let claims = test_claims();

        let token = service.generate_token(&claims).await.unwrap();
        let authenticated = service.authenticate(&bearer(&token)).await.unwrap();

        assert_eq!(authenticated, claims);
        assert!(service.key_cache().contains(TEST_KID));
    }

    #[tokio::test]
    async fn test_malformed_header_skips_key_lookup() {
        let (service, source) = counting_service();

        assert_auth_error!(service.authenticate("Token abc").await, MalformedHeader);
        assert_auth_error!(service.authenticate("Bearer ").await, TokenParse);
        assert_auth_error!(service.authenticate("Bearer a.b").await, TokenParse);

        assert_eq!(source.public_calls(), 0);
        assert!(service.key_cache().is_empty());
    }

    #[tokio::test]
    async fn test_generate_token_unknown_active_kid() {
        let config = AuthConfig::builder().active_kid("retired").build().unwrap();
        let service = AuthService::with_builtin_rules(config, Arc::new(MemoryKeyStore::new()));

        let result = service.generate_token(&test_claims()).await;
        assert!(matches!(
            result,
            Err(AuthError::KeyLookup { ref kid, source: KeyError::NotFound { .. } }) if kid == "retired"
        ));
    }

    #[tokio::test]
    async fn test_generate_token_fetches_private_key_each_time() {
        let (service, source) = counting_service();

        service.generate_token(&test_claims()).await.unwrap();
        service.generate_token(&test_claims()).await.unwrap();

        assert_eq!(source.private_calls(), 2);
        assert_eq!(source.public_calls(), 0);
    }

    #[tokio::test]
    async fn test_authorize() {
        let (service, _) = counting_service();
        let user = test_claims();
        let admin = admin_claims();
        let other = UserId::from_u128(42);

        assert!(service.authorize(&user, user.subject(), RULE_SELF_OR_ADMIN).await.is_ok());
        assert_auth_error!(service.authorize(&user, other, RULE_SELF_OR_ADMIN).await, AuthorizationFailed);
        assert!(service.authorize(&admin, other, RULE_SELF_OR_ADMIN).await.is_ok());
        assert_auth_error!(service.authorize(&user, other, RULE_ADMIN_ONLY).await, AuthorizationFailed);
    }

    #[tokio::test]
    async fn test_authorize_unknown_rule_fails_closed() {
        let (service, _) = counting_service();
        let admin = admin_claims();

        assert_auth_error!(
            service.authorize(&admin, admin.subject(), "no-such-rule").await,
            AuthorizationFailed
        );
    }

    struct FailingPolicy;

    #[async_trait::async_trait]
    impl PolicyEvaluator for FailingPolicy {
        async fn evaluate(
            &self,
            _module: PolicyModule,
            _rule: &str,
            _input: &PolicyInput<'_>,
        ) -> std::result::Result<bool, PolicyError> {
            Err(PolicyError::Evaluation("engine unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_policy_errors_map_to_opaque_failures() {
        let source = CountingKeySource::new(asperitas_keystore::testutil::store_with_key(TEST_KID));
        let issuer = AuthService::with_builtin_rules(test_config(), source.clone());
        let service = AuthService::new(test_config(), source, Arc::new(FailingPolicy));

        let token = issuer.generate_token(&test_claims()).await.unwrap();

        assert_auth_error!(service.authenticate(&bearer(&token)).await, AuthenticationFailed);
        assert_auth_error!(
            service.authorize(&test_claims(), UserId::nil(), RULE_SELF_OR_ADMIN).await,
            AuthorizationFailed
        );
    }
}
