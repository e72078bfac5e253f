//! Policy evaluation: named declarative rules over structured input.
//!
//! The [`PolicyEvaluator`] trait is the seam to whatever decides; the
//! [`RuleTable`] is the built-in compiled implementation.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    claims::{Role, UserId},
    token,
};

/// Authentication rule: the token verifies under the supplied public key.
pub const RULE_AUTHENTICATE: &str = "authenticate";
/// Authorization rule: the caller holds at least one role.
pub const RULE_ANY: &str = "any-authenticated";
/// Authorization rule: the caller is an admin.
pub const RULE_ADMIN_ONLY: &str = "admin-only";
/// Authorization rule: the caller holds the user role.
pub const RULE_USER_ONLY: &str = "user-only";
/// Authorization rule: the caller is an admin or is the target user.
pub const RULE_SELF_OR_ADMIN: &str = "self-or-admin";

/// Authorization rules registered by [`RuleTable::new`].
pub const BUILTIN_AUTHORIZATION_RULES: &[&str] =
    &[RULE_ANY, RULE_ADMIN_ONLY, RULE_USER_ONLY, RULE_SELF_OR_ADMIN];

/// The module a rule belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyModule {
    /// Token verification rules.
    Authentication,
    /// Access control rules.
    Authorization,
}

impl PolicyModule {
    /// Stable name of the module.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
        }
    }
}

impl fmt::Display for PolicyModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input handed to a rule, built per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "module", rename_all = "lowercase")]
pub enum PolicyInput<'a> {
    /// Verify `token` under `key`.
    Authentication {
        /// Public key PEM.
        key: &'a str,
        /// Raw compact token.
        token: &'a str,
    },
    /// Decide whether the caller may act on `user_id`.
    Authorization {
        /// Roles held by the caller.
        roles: &'a BTreeSet<Role>,
        /// The caller's user id.
        subject: UserId,
        /// The user being acted on; nil when the route names none.
        user_id: UserId,
    },
}

impl PolicyInput<'_> {
    /// The module this input is shaped for.
    #[must_use]
    pub const fn module(&self) -> PolicyModule {
        match self {
            Self::Authentication { .. } => PolicyModule::Authentication,
            Self::Authorization { .. } => PolicyModule::Authorization,
        }
    }
}

/// Policy evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// No rule with this name exists in the module.
    #[error("unknown rule {module}/{rule}")]
    UnknownRule {
        /// Module searched.
        module: PolicyModule,
        /// Rule name requested.
        rule: String,
    },

    /// The input is shaped for a different module.
    #[error("input does not match module for rule {module}/{rule}")]
    InputMismatch {
        /// Module of the rule.
        module: PolicyModule,
        /// Rule name requested.
        rule: String,
    },

    /// The evaluator failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),
}

/// Evaluates a named rule against structured input.
///
/// Implementations must be deterministic and free of side effects for a
/// given `(module, rule, input)`. Cancellation is by dropping the returned
/// future.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Returns whether `rule` in `module` holds for `input`.
    async fn evaluate(
        &self,
        module: PolicyModule,
        rule: &str,
        input: &PolicyInput<'_>,
    ) -> Result<bool, PolicyError>;
}

#[async_trait]
impl<T: PolicyEvaluator + ?Sized> PolicyEvaluator for Arc<T> {
    async fn evaluate(
        &self,
        module: PolicyModule,
        rule: &str,
        input: &PolicyInput<'_>,
    ) -> Result<bool, PolicyError> {
        (**self).evaluate(module, rule, input).await
    }
}

/// A compiled rule predicate.
pub type Predicate = Arc<dyn Fn(&PolicyInput<'_>) -> Result<bool, PolicyError> + Send + Sync>;

/// Built-in [`PolicyEvaluator`] backed by a table of compiled predicates.
#[derive(Clone)]
pub struct RuleTable {
    rules: HashMap<(PolicyModule, String), Predicate>,
}

impl RuleTable {
    /// A table with the built-in rules and no clock leeway.
    #[must_use]
    pub fn new() -> Self {
        Self::with_leeway(Duration::ZERO)
    }

    /// A table with the built-in rules; `leeway` applies to token expiry
    /// checks in [`RULE_AUTHENTICATE`].
    #[must_use]
    pub fn with_leeway(leeway: Duration) -> Self {
        Self::empty()
            .with_rule(PolicyModule::Authentication, RULE_AUTHENTICATE, move |input| {
                Ok(authenticate(input, leeway))
            })
            .with_rule(PolicyModule::Authorization, RULE_ANY, |input| {
                Ok(roles_of(input).is_some_and(|roles| !roles.is_empty()))
            })
            .with_rule(PolicyModule::Authorization, RULE_ADMIN_ONLY, |input| {
                Ok(holds(input, Role::Admin))
            })
            .with_rule(PolicyModule::Authorization, RULE_USER_ONLY, |input| {
                Ok(holds(input, Role::User))
            })
            .with_rule(PolicyModule::Authorization, RULE_SELF_OR_ADMIN, |input| {
                Ok(holds(input, Role::Admin) || is_self(input))
            })
    }

    /// A table with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    /// Registers `predicate` as `name` in `module`, replacing any rule of
    /// the same name.
    #[must_use]
    pub fn with_rule<F>(mut self, module: PolicyModule, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&PolicyInput<'_>) -> Result<bool, PolicyError> + Send + Sync + 'static,
    {
        self.rules.insert((module, name.into()), Arc::new(predicate));
        self
    }

    /// Returns `true` if `name` is registered in `module`.
    #[must_use]
    pub fn contains(&self, module: PolicyModule, name: &str) -> bool {
        self.rules.contains_key(&(module, name.to_owned()))
    }

    /// Rule names registered in `module`, sorted.
    #[must_use]
    pub fn rule_names(&self, module: PolicyModule) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rules
            .keys()
            .filter(|(m, _)| *m == module)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    fn eval_sync(
        &self,
        module: PolicyModule,
        rule: &str,
        input: &PolicyInput<'_>,
    ) -> Result<bool, PolicyError> {
        let predicate = self
            .rules
            .get(&(module, rule.to_owned()))
            .ok_or_else(|| PolicyError::UnknownRule { module, rule: rule.to_owned() })?;

        if input.module() != module {
            return Err(PolicyError::InputMismatch { module, rule: rule.to_owned() });
        }

        predicate(input)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field("authentication", &self.rule_names(PolicyModule::Authentication))
            .field("authorization", &self.rule_names(PolicyModule::Authorization))
            .finish()
    }
}

#[async_trait]
impl PolicyEvaluator for RuleTable {
    async fn evaluate(
        &self,
        module: PolicyModule,
        rule: &str,
        input: &PolicyInput<'_>,
    ) -> Result<bool, PolicyError> {
        self.eval_sync(module, rule, input)
    }
}

fn authenticate(input: &PolicyInput<'_>, leeway: Duration) -> bool {
    match input {
        PolicyInput::Authentication { key, token } => token::verify(token, key, leeway).is_ok(),
        PolicyInput::Authorization { .. } => false,
    }
}

fn roles_of<'a>(input: &PolicyInput<'a>) -> Option<&'a BTreeSet<Role>> {
    match input {
        PolicyInput::Authorization { roles, .. } => Some(*roles),
        PolicyInput::Authentication { .. } => None,
    }
}

fn holds(input: &PolicyInput<'_>, role: Role) -> bool {
    roles_of(input).is_some_and(|roles| roles.contains(&role))
}

fn is_self(input: &PolicyInput<'_>) -> bool {
    matches!(input, PolicyInput::Authorization { subject, user_id, .. } if subject == user_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::testutil::{expired_claims, sign, test_claims, test_public_pem};

    const ALICE: UserId = UserId::from_u128(1);
    const BOB: UserId = UserId::from_u128(2);

    fn authz(roles: &BTreeSet<Role>, subject: UserId, user_id: UserId) -> PolicyInput<'_> {
        PolicyInput::Authorization { roles, subject, user_id }
    }

    #[rstest]
    #[case::any_user(RULE_ANY, &[Role::User], ALICE, BOB, true)]
    #[case::any_none(RULE_ANY, &[], ALICE, BOB, false)]
    #[case::admin_admin(RULE_ADMIN_ONLY, &[Role::Admin], ALICE, BOB, true)]
    #[case::admin_user(RULE_ADMIN_ONLY, &[Role::User], ALICE, ALICE, false)]
    #[case::user_user(RULE_USER_ONLY, &[Role::User], ALICE, BOB, true)]
    #[case::user_admin(RULE_USER_ONLY, &[Role::Admin], ALICE, BOB, false)]
    #[case::self_match(RULE_SELF_OR_ADMIN, &[Role::User], ALICE, ALICE, true)]
    #[case::self_other(RULE_SELF_OR_ADMIN, &[Role::User], ALICE, BOB, false)]
    #[case::self_admin(RULE_SELF_OR_ADMIN, &[Role::Admin], ALICE, BOB, true)]
    #[case::self_nil_target(RULE_SELF_OR_ADMIN, &[Role::User], ALICE, UserId::nil(), false)]
    #[tokio::test]
    async fn test_authorization_rules(
        #[case] rule: &str,
        #[case] roles: &[Role],
        #[case] subject: UserId,
        #[case] user_id: UserId,
        #[case] expected: bool,
    ) {
        let roles: BTreeSet<Role> = roles.iter().copied().collect();
        let decision = RuleTable::new()
            .evaluate(PolicyModule::Authorization, rule, &authz(&roles, subject, user_id))
            .await
            .unwrap();
        assert_eq!(decision, expected);
    }

    #[tokio::test]
    async fn test_authenticate_rule() {
        let table = RuleTable::new();
        let key = test_public_pem();

        let valid = sign(&test_claims());
        let input = PolicyInput::Authentication { key: &key, token: &valid };
        assert!(table.evaluate(PolicyModule::Authentication, RULE_AUTHENTICATE, &input).await.unwrap());

        let expired = sign(&expired_claims());
        let input = PolicyInput::Authentication { key: &key, token: &expired };
        assert!(!table.evaluate(PolicyModule::Authentication, RULE_AUTHENTICATE, &input).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_rule() {
        let roles = BTreeSet::new();
        let result = RuleTable::new()
            .evaluate(PolicyModule::Authorization, "owner-only", &authz(&roles, ALICE, BOB))
            .await;
        assert_eq!(
            result,
            Err(PolicyError::UnknownRule { module: PolicyModule::Authorization, rule: "owner-only".into() })
        );
    }

    #[tokio::test]
    async fn test_rule_names_are_scoped_by_module() {
        let roles = BTreeSet::from([Role::Admin]);
        let result = RuleTable::new()
            .evaluate(PolicyModule::Authentication, RULE_ADMIN_ONLY, &authz(&roles, ALICE, BOB))
            .await;
        assert!(matches!(result, Err(PolicyError::UnknownRule { .. })));
    }

    #[tokio::test]
    async fn test_input_mismatch() {
        let roles = BTreeSet::from([Role::Admin]);
        let result = RuleTable::new()
            .evaluate(PolicyModule::Authentication, RULE_AUTHENTICATE, &authz(&roles, ALICE, BOB))
            .await;
        assert!(matches!(result, Err(PolicyError::InputMismatch { .. })));
    }

    #[tokio::test]
    async fn test_custom_rule() {
        let table = RuleTable::new().with_rule(PolicyModule::Authorization, "nobody", |_| Ok(false));
        let roles = BTreeSet::from([Role::Admin]);

        assert!(table.contains(PolicyModule::Authorization, "nobody"));
        assert!(!table.evaluate(PolicyModule::Authorization, "nobody", &authz(&roles, ALICE, ALICE)).await.unwrap());
    }

    #[test]
    fn test_builtin_rule_names() {
        let table = RuleTable::new();
        assert_eq!(table.rule_names(PolicyModule::Authentication), vec![RULE_AUTHENTICATE]);

        let mut expected = BUILTIN_AUTHORIZATION_RULES.to_vec();
        expected.sort_unstable();
        assert_eq!(table.rule_names(PolicyModule::Authorization), expected);
        assert!(RuleTable::empty().rule_names(PolicyModule::Authorization).is_empty());
    }

    #[test]
    fn test_input_serialization() {
        let roles = BTreeSet::from([Role::User]);
        let value = serde_json::to_value(authz(&roles, ALICE, BOB)).unwrap();
        assert_eq!(
            value,
            json!({
                "module": "authorization",
                "roles": ["USER"],
                "subject": ALICE.to_string(),
                "user_id": BOB.to_string(),
            })
        );
    }
}
