//! Identity claims carried by a bearer token.

use std::{collections::BTreeSet, fmt, str::FromStr, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a user account.
pub type UserId = uuid::Uuid;

/// Issuer stamped into claims built with [`Claims::for_user`].
pub const DEFAULT_ISSUER: &str = "asperitas project";

/// Lifetime of claims built by the login flow.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// A role granted to a user.
///
/// The set is closed: any other name is rejected when claims are built or
/// decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Administrative access.
    Admin,
    /// Regular user access.
    User,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {name:?}")]
pub struct RoleParseError {
    /// The rejected name.
    pub name: String,
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            other => Err(RoleParseError { name: other.to_owned() }),
        }
    }
}

/// The user a token was issued to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account id.
    pub id: UserId,
    /// Login name.
    pub username: String,
}

/// Claims asserted by a token.
///
/// Claims are immutable once built: fields are read through accessors and
/// new values come from [`Claims::builder`] or [`Claims::for_user`].
///
/// Timestamps are seconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Claims {
    #[serde(rename = "sub")]
    subject: UserId,
    #[serde(rename = "iss")]
    #[builder(into)]
    issuer: String,
    #[serde(rename = "iat")]
    issued_at: i64,
    #[serde(rename = "exp")]
    expires_at: i64,
    user: User,
    #[serde(default)]
    #[builder(default)]
    roles: BTreeSet<Role>,
}

impl Claims {
    /// Issues claims for `user`, valid from now for `ttl`.
    ///
    /// The subject is the user's id and the issuer is [`DEFAULT_ISSUER`].
    #[must_use]
    pub fn for_user(user: User, roles: impl IntoIterator<Item = Role>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            subject: user.id,
            issuer: DEFAULT_ISSUER.to_owned(),
            issued_at: now,
            expires_at: now.saturating_add(ttl),
            user,
            roles: roles.into_iter().collect(),
        }
    }

    /// The subject user id.
    #[must_use]
    pub fn subject(&self) -> UserId {
        self.subject
    }

    /// The issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issued-at timestamp.
    #[must_use]
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Expiry timestamp.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// The user the claims were issued to.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Granted roles.
    #[must_use]
    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    /// Returns `true` if `role` was granted.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns `true` if the admin role was granted.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Returns `true` if the claims are expired at `now` (seconds since
    /// epoch).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
