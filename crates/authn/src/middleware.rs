//! axum middleware adapters and request context helpers.
//!
//! [`authenticate`] turns the `Authorization` header into [`Claims`] stored
//! in the request extensions; [`authorize`] reads them back together with
//! the optional `user_id` path parameter and asks the service whether the
//! route's rule allows the call.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use asperitas_authn::{
//!     AuthConfig, AuthService,
//!     middleware::{AuthorizeLayerState, authenticate, authorize, claims_from},
//!     policy::RULE_SELF_OR_ADMIN,
//! };
//! use asperitas_keystore::MemoryKeyStore;
//! use axum::{Router, extract::Request, middleware::from_fn_with_state, routing::get};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::builder().active_kid("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1").build()?;
//! let keys = Arc::new(MemoryKeyStore::from_dir("deploy/keys")?);
//! let service = Arc::new(AuthService::with_builtin_rules(config, keys));
//!
//! let owner = AuthorizeLayerState::new(Arc::clone(&service), RULE_SELF_OR_ADMIN)?;
//! let app: Router = Router::new()
//!     .route(
//!         "/users/:user_id",
//!         get(|req: Request| async move {
//!             claims_from(req.extensions()).map(|c| c.user().username.clone()).unwrap_or_default()
//!         }),
//!     )
//!     .route_layer(from_fn_with_state(owner, authorize))
//!     .route_layer(from_fn_with_state(service, authenticate));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        RawPathParams, Request, State,
        rejection::RawPathParamsRejection,
    },
    http::{Extensions, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    claims::{Claims, UserId},
    config::ConfigError,
    error::AuthError,
    service::AuthService,
};

/// Path parameter naming the user a request acts on.
pub const USER_ID_PARAM: &str = "user_id";

/// The user a request acts on, parsed from the `user_id` path parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetUser(pub UserId);

/// Claims stored by [`authenticate`].
#[must_use]
pub fn claims_from(extensions: &Extensions) -> Option<&Claims> {
    extensions.get::<Claims>()
}

/// Target user stored by [`authorize`].
#[must_use]
pub fn target_user_from(extensions: &Extensions) -> Option<UserId> {
    extensions.get::<TargetUser>().map(|target| target.0)
}

impl AuthError {
    /// HTTP status class of this error.
    ///
    /// Everything raised while authenticating a request is `401` except a
    /// transient key source failure, which is `503`. Signing failures are
    /// server faults.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::KeyLookup { source, .. } if source.is_transient() => {
                StatusCode::SERVICE_UNAVAILABLE
            },
            Self::MalformedHeader
            | Self::TokenParse { .. }
            | Self::MissingKid
            | Self::KidType
            | Self::KeyLookup { .. }
            | Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::AuthorizationFailed => StatusCode::FORBIDDEN,
            Self::KeyParse { .. } | Self::Signing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response returned when a request is turned away.
///
/// Bodies are generic; the reason is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Authentication failed.
    Unauthorized,
    /// Authorization failed or no claims were present.
    Forbidden,
    /// The `user_id` path parameter is not a valid id.
    InvalidId,
    /// The key source is temporarily unreachable.
    Unavailable,
    /// The service failed.
    Internal,
}

impl AuthRejection {
    /// HTTP status of the rejection.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidId => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::InvalidId => "invalid ID",
            Self::Unavailable => "Service Unavailable",
            Self::Internal => "Internal Server Error",
        }
    }
}

impl From<&AuthError> for AuthRejection {
    fn from(err: &AuthError) -> Self {
        match err.status_code() {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::SERVICE_UNAVAILABLE => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Authenticates the request's bearer token and stores the [`Claims`] in
/// the request extensions.
///
/// A missing or non-UTF-8 `Authorization` header is treated as empty.
pub async fn authenticate(
    State(service): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let claims = service.authenticate(&header).await.map_err(|err| {
        if err.is_malformed_request() {
            tracing::debug!(error = %err, "malformed authentication request");
        } else {
            tracing::info!(error = %err, "request authentication failed");
        }
        AuthRejection::from(&err)
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// State for [`authorize`]: the service and the rule a route requires.
#[derive(Clone, Debug)]
pub struct AuthorizeLayerState {
    service: Arc<AuthService>,
    rule: Arc<str>,
}

impl AuthorizeLayerState {
    /// Binds `rule` to a route.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UndeclaredRule`] if the service configuration
    /// does not declare `rule`.
    pub fn new(service: Arc<AuthService>, rule: &str) -> Result<Self, ConfigError> {
        service.config().validate_rule(rule)?;
        Ok(Self { service, rule: Arc::from(rule) })
    }

    /// The rule this route requires.
    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }
}

/// Authorizes the authenticated caller against the route's rule.
///
/// Must run after [`authenticate`]. The target user comes from the
/// `user_id` path parameter and defaults to the nil id when the route has
/// none; a parsed target is stored as [`TargetUser`]. Path parameters that
/// cannot be decoded are rejected as an invalid id.
pub async fn authorize(
    State(state): State<AuthorizeLayerState>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let Some(claims) = req.extensions().get::<Claims>().cloned() else {
        tracing::warn!(rule = %state.rule, "authorize reached without claims");
        return Err(AuthRejection::Forbidden);
    };

    let raw_target = target_param(params)?;

    let target = match raw_target {
        Some(raw) => {
            let id = raw.parse::<UserId>().map_err(|_| AuthRejection::InvalidId)?;
            req.extensions_mut().insert(TargetUser(id));
            id
        },
        None => UserId::nil(),
    };

    state.service.authorize(&claims, target, &state.rule).await.map_err(|err| {
        tracing::info!(error = %err, rule = %state.rule, "request authorization failed");
        AuthRejection::from(&err)
    })?;

    Ok(next.run(req).await)
}

/// The raw `user_id` parameter, if the route has one.
fn target_param(
    params: Result<RawPathParams, RawPathParamsRejection>,
) -> Result<Option<String>, AuthRejection> {
    match params {
        Ok(params) => Ok(params
            .iter()
            .find(|(name, _)| *name == USER_ID_PARAM)
            .map(|(_, value)| value.to_owned())),
        Err(RawPathParamsRejection::MissingPathParams(_)) => Ok(None),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "undecodable path parameter");
            Err(AuthRejection::InvalidId)
        },
    }
}
