use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use mindful_core::{models::Principal, CoreError};
use uuid::Uuid;

use super::{ApiError, AppState};

/// Header carrying the authenticated user id, set by the upstream identity provider.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller of a request, resolved from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Principal);

impl std::ops::Deref for CurrentUser {
    type Target = Principal;

    fn deref(&self) -> &Principal {
        &self.0
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".into()))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| ApiError::BadRequest("X-User-Id must be a UUID".into()))?;

        match state.db.principal(user_id) {
            Ok(principal) => Ok(Self(principal)),
            Err(CoreError::NotFound { .. }) => {
                tracing::debug!(%user_id, "request from unknown user");
                Err(ApiError::Unauthorized(format!("unknown user {user_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Absent header means an anonymous caller; a present but unusable one is still rejected.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(USER_ID_HEADER) {
            return Ok(None);
        }
        <Self as FromRequestParts<AppState>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
