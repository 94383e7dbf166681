use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{error, warn};

use super::cookies::{read_cookie, ACCESS_TOKEN_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo_types::User;

/// The authenticated caller, loaded from the store.
/// The access token comes from the `accessToken` cookie or a Bearer header.
pub struct AuthUser(pub User);

fn bearer(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, ACCESS_TOKEN_COOKIE)
            .or_else(|| bearer(parts))
            .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

        let user_id = state.tokens.verify_access_token(&token).map_err(|e| {
            warn!("invalid or expired access token");
            e
        })?;

        let user = state
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "load authenticated user failed");
                ApiError::Internal("A database error occurred".into())
            })?
            .ok_or_else(|| {
                warn!(%user_id, "access token for unknown user");
                ApiError::unauthorized("Invalid Access Token")
            })?;

        Ok(AuthUser(user))
    }
}
