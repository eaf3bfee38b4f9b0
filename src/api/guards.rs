use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims};
use crate::core::state::AppState;

/// Bearer capability scoped to one session. Handlers must still compare
/// `claims.sub` against the path-addressed session token; the guard only
/// proves the bearer holds *a* valid session capability.
pub(crate) struct SessionCapability(pub(crate) Claims);

pub(crate) struct CurrentAdmin(pub(crate) Claims);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))
}

#[async_trait]
impl FromRequestParts<AppState> for SessionCapability {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = bearer_token(parts)?;
        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        if claims.role != security::ROLE_SESSION {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(SessionCapability(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = bearer_token(parts)?;
        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        if claims.role != security::ROLE_ADMIN {
            return Err(ApiError::forbidden("admin_required", "Admin access required"));
        }

        Ok(CurrentAdmin(claims))
    }
}

/// Rejects a capability presented against a different session's path.
pub(crate) fn require_session_match(claims: &Claims, session_token: &str) -> Result<(), ApiError> {
    if claims.sub == session_token {
        Ok(())
    } else {
        Err(ApiError::forbidden("capability_mismatch", "Capability does not match this session"))
    }
}
