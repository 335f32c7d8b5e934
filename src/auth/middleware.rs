//! Authentication middleware
//!
//! The request gate is two plain functions applied in order:
//! `resolve_identity` turns the bearer header into a typed [`Identity`], and
//! `authorize` checks that identity against a [`RolePolicy`]. The axum
//! middleware below only adapts them to the router; handlers then pull the
//! identity out with the [`CurrentUser`] extractor.

use crate::auth::{Claims, Role, TokenService};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Validated identity attached to a request by the identity stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Set of roles allowed through a role stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePolicy {
    name: &'static str,
    roles: &'static [Role],
}

impl RolePolicy {
    pub const ADMIN_ONLY: RolePolicy = RolePolicy {
        name: "admin",
        roles: &[Role::Admin],
    };

    pub const ADMIN_OR_SUBDIRECCION: RolePolicy = RolePolicy {
        name: "admin or subdireccion",
        roles: &[Role::Admin, Role::Subdireccion],
    };

    pub const ANY_STAFF: RolePolicy = RolePolicy {
        name: "any staff role",
        roles: &Role::ALL,
    };

    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Identity stage: bearer header -> verified identity
pub fn resolve_identity(tokens: &TokenService, headers: &HeaderMap) -> Result<Identity, AppError> {
    let bearer = headers
        .typed_try_get::<Authorization<Bearer>>()
        .map_err(|_| AppError::Unauthenticated("Malformed authorization header".to_string()))?
        .ok_or_else(|| AppError::Unauthenticated("Access token required".to_string()))?;

    let claims = tokens.verify(bearer.token())?;
    Ok(Identity::from(claims))
}

/// Role stage: identity must be present and hold one of the policy's roles
pub fn authorize(identity: Option<&Identity>, policy: RolePolicy) -> Result<&Identity, AppError> {
    let identity = identity
        .ok_or_else(|| AppError::Unauthenticated("User is not authenticated".to_string()))?;

    if !policy.allows(identity.role) {
        return Err(AppError::Forbidden(format!(
            "Access denied. Requires {} role",
            policy.name()
        )));
    }

    Ok(identity)
}

/// Identity stage as axum middleware
pub async fn authenticate(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&state.tokens, request.headers()).map_err(|e| {
        debug!(path = %request.uri().path(), "Identity stage rejected request: {}", e);
        e
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Role stage as axum middleware, parameterized by its policy state
pub async fn require_role(
    State(policy): State<RolePolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authorize(request.extensions().get::<Identity>(), policy).map_err(|e| {
        warn!(path = %request.uri().path(), policy = policy.name(), "Role stage rejected request: {}", e);
        e
    })?;

    debug!(user_id = %identity.user_id, role = %identity.role, path = %request.uri().path(), "Authorization successful");
    Ok(next.run(request).await)
}

/// Extractor for the identity placed by the identity stage
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthenticated("User is not authenticated".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    fn tokens() -> TokenService {
        TokenService::new(b"middleware-test-secret", 24)
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "someone".to_string(),
            role,
        }
    }

    #[test]
    fn test_missing_header_is_unauthenticated() {
        let result = resolve_identity(&tokens(), &HeaderMap::new());
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn test_non_bearer_scheme_is_unauthenticated() {
        for value in ["Basic dXNlcjpwYXNz", "token_without_bearer", "Bearer"] {
            let result = resolve_identity(&tokens(), &headers_with(value));
            assert!(matches!(result, Err(AppError::Unauthenticated(_))), "{value}");
        }
    }

    #[test]
    fn test_garbage_bearer_is_invalid_token() {
        let result = resolve_identity(&tokens(), &headers_with("Bearer not.a.jwt"));
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_valid_bearer_resolves_identity() {
        let tokens = tokens();
        let id = Uuid::new_v4();
        let token = tokens.issue(id, "capturista", Role::ControlEscolar).unwrap();

        let identity = resolve_identity(&tokens, &headers_with(&format!("Bearer {}", token))).unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.username, "capturista");
        assert_eq!(identity.role, Role::ControlEscolar);
    }

    #[test]
    fn test_expired_bearer_maps_to_expired() {
        let tokens = tokens();
        let token = tokens
            .issue_at(Uuid::new_v4(), "old", Role::Admin, chrono::Utc::now().timestamp() - 90_000)
            .unwrap();
        let result = resolve_identity(&tokens, &headers_with(&format!("Bearer {}", token)));
        assert!(matches!(result, Err(AppError::Expired)));
    }

    #[test]
    fn test_authorize_requires_identity() {
        let result = authorize(None, RolePolicy::ANY_STAFF);
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn test_policies_match_role_sets() {
        let admin = identity(Role::Admin);
        let sub = identity(Role::Subdireccion);
        let ce = identity(Role::ControlEscolar);

        assert!(authorize(Some(&admin), RolePolicy::ADMIN_ONLY).is_ok());
        assert!(matches!(authorize(Some(&sub), RolePolicy::ADMIN_ONLY), Err(AppError::Forbidden(_))));
        assert!(matches!(authorize(Some(&ce), RolePolicy::ADMIN_ONLY), Err(AppError::Forbidden(_))));

        assert!(authorize(Some(&admin), RolePolicy::ADMIN_OR_SUBDIRECCION).is_ok());
        assert!(authorize(Some(&sub), RolePolicy::ADMIN_OR_SUBDIRECCION).is_ok());
        assert!(authorize(Some(&ce), RolePolicy::ADMIN_OR_SUBDIRECCION).is_err());

        let records = RolePolicy {
            name: "admin or control_escolar",
            roles: &[Role::Admin, Role::ControlEscolar],
        };
        assert!(authorize(Some(&admin), records).is_ok());
        assert!(authorize(Some(&sub), records).is_err());
        assert!(authorize(Some(&ce), records).is_ok());

        for who in [&admin, &sub, &ce] {
            assert!(authorize(Some(who), RolePolicy::ANY_STAFF).is_ok());
        }
    }

    #[test]
    fn test_stacked_role_stages_are_order_independent() {
        let sub = identity(Role::Subdireccion);
        let stages = [RolePolicy::ADMIN_OR_SUBDIRECCION, RolePolicy::ANY_STAFF];

        let forward = stages.iter().try_for_each(|p| authorize(Some(&sub), *p).map(|_| ()));
        let backward = stages.iter().rev().try_for_each(|p| authorize(Some(&sub), *p).map(|_| ()));
        assert!(forward.is_ok());
        assert!(backward.is_ok());
    }
}
