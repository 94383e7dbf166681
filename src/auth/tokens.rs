//! Access/refresh token issuance and single-use refresh rotation.
//!
//! Each user has at most one valid refresh token: the value stored on the
//! user record. Issuing a pair overwrites it, rotating swaps it atomically
//! (only if it still equals the presented token) and revoking clears it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::claims::{ProfileClaims, TokenKind};
use super::jwt::{failure_message, JwtKeys};
use crate::config::JwtConfig;
use crate::error::{ApiError, ApiResult};
use crate::users::repo::UserStore;
use crate::users::repo_types::User;

const ISSUE_FAILED: &str = "Something went wrong while generating refresh and access token";
const INVALID_REFRESH: &str = "Invalid refresh token";
const REFRESH_USED: &str = "Refresh token is expired or used";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<JwtKeys>,
    users: Arc<dyn UserStore>,
}

impl TokenIssuer {
    pub fn new(cfg: &JwtConfig, users: Arc<dyn UserStore>) -> Self {
        Self {
            keys: Arc::new(JwtKeys::new(cfg)),
            users,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    fn mint(&self, user: &User) -> ApiResult<TokenPair> {
        let profile = ProfileClaims {
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        };
        let access_token = self.keys.sign_access(user.id, profile).map_err(|e| {
            error!(error = %e, user_id = %user.id, "jwt sign access failed");
            ApiError::Internal(ISSUE_FAILED.into())
        })?;
        let refresh_token = self.keys.sign_refresh(user.id).map_err(|e| {
            error!(error = %e, user_id = %user.id, "jwt sign refresh failed");
            ApiError::Internal(ISSUE_FAILED.into())
        })?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Mints a fresh pair for `user_id` and makes its refresh token the only
    /// valid one.
    pub async fn issue_token_pair(&self, user_id: Uuid) -> ApiResult<TokenPair> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "load user for token issue failed");
                ApiError::Internal(ISSUE_FAILED.into())
            })?
            .ok_or_else(|| ApiError::NotFound("User does not exist".into()))?;

        let pair = self.mint(&user)?;

        let stored = self
            .users
            .set_refresh_token(user.id, Some(&pair.refresh_token))
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "persist refresh token failed");
                ApiError::Internal(ISSUE_FAILED.into())
            })?;
        if !stored {
            error!(%user_id, "user vanished before refresh token was stored");
            return Err(ApiError::Internal(ISSUE_FAILED.into()));
        }

        info!(%user_id, "token pair issued");
        Ok(pair)
    }

    pub fn verify_access_token(&self, token: &str) -> ApiResult<Uuid> {
        self.keys
            .verify(token, TokenKind::Access)
            .map(|claims| claims.sub)
            .map_err(|_| ApiError::unauthorized("Invalid Access Token"))
    }

    /// Exchanges a valid, current refresh token for a new pair. The presented
    /// token stops being valid the moment this succeeds.
    pub async fn rotate_refresh_token(&self, presented: Option<&str>) -> ApiResult<TokenPair> {
        let presented = match presented {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(ApiError::unauthorized("unauthorized request")),
        };

        let claims = self
            .keys
            .verify(presented, TokenKind::Refresh)
            .map_err(|e| {
                warn!(error = %e, "refresh token verification failed");
                ApiError::unauthorized(failure_message(&e).unwrap_or(INVALID_REFRESH))
            })?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %claims.sub, "load user for rotation failed");
                ApiError::Internal(ISSUE_FAILED.into())
            })?
            .ok_or_else(|| ApiError::unauthorized(INVALID_REFRESH))?;

        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %user.id, "refresh token reuse or revoked token presented");
            return Err(ApiError::unauthorized(REFRESH_USED));
        }

        let pair = self.mint(&user)?;

        let swapped = self
            .users
            .swap_refresh_token(user.id, presented, &pair.refresh_token)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user.id, "persist rotated refresh token failed");
                ApiError::Internal(ISSUE_FAILED.into())
            })?;
        if !swapped {
            // another rotation of the same token landed first
            warn!(user_id = %user.id, "refresh token rotated concurrently");
            return Err(ApiError::unauthorized(REFRESH_USED));
        }

        info!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Clears the stored refresh token.
    pub async fn revoke(&self, user_id: Uuid) -> ApiResult<()> {
        let cleared = self.users.set_refresh_token(user_id, None).await?;
        if !cleared {
            return Err(ApiError::NotFound("User does not exist".into()));
        }
        info!(%user_id, "refresh token revoked");
        Ok(())
    }
}
