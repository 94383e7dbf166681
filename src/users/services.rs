use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{ChannelProfile, PublicUser, User, WatchedVideo};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, lowercased identifier; blank becomes `None`.
pub(crate) fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

pub async fn update_account(
    state: &AppState,
    user_id: Uuid,
    full_name: &str,
    email: &str,
) -> ApiResult<PublicUser> {
    let full_name = full_name.trim();
    let email = normalize(Some(email)).unwrap_or_default();
    if full_name.is_empty() || email.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }
    let user = state
        .users
        .update_account(user_id, full_name, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".into()))?;
    info!(%user_id, "account details updated");
    Ok(user.into())
}

/// Which profile image an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn missing_message(self) -> &'static str {
        match self {
            Self::Avatar => "Avatar file is missing",
            Self::CoverImage => "Cover image file is missing",
        }
    }

    fn upload_failed_message(self) -> &'static str {
        match self {
            Self::Avatar => "Error while uploading on avatar",
            Self::CoverImage => "Error while uploading on cover image",
        }
    }

    fn current(self, user: &User) -> Option<&str> {
        match self {
            Self::Avatar => user.avatar.as_deref(),
            Self::CoverImage => user.cover_image.as_deref(),
        }
    }
}

/// Uploads `file` and points the user's avatar or cover image at it. The
/// previous object is deleted once the new URL is stored.
pub async fn replace_image(
    state: &AppState,
    user: &User,
    kind: ProfileImage,
    file: Option<PathBuf>,
) -> ApiResult<PublicUser> {
    let path = file.ok_or_else(|| ApiError::validation(kind.missing_message()))?;
    let uploaded = state.media.upload(&path).await.map_err(|e| {
        warn!(error = %e, ?kind, user_id = %user.id, "profile image upload failed");
        ApiError::validation(kind.upload_failed_message())
    })?;

    let stored = match kind {
        ProfileImage::Avatar => state.users.update_avatar(user.id, &uploaded.url).await,
        ProfileImage::CoverImage => state.users.update_cover_image(user.id, &uploaded.url).await,
    };
    let updated = match stored {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.media.remove_uploaded([uploaded.url.as_str()]).await;
            return Err(ApiError::NotFound("User does not exist".into()));
        }
        Err(e) => {
            state.media.remove_uploaded([uploaded.url.as_str()]).await;
            return Err(e.into());
        }
    };

    if let Some(old) = kind.current(user) {
        if let Err(e) = state.media.delete_by_url(old).await {
            warn!(error = %e, url = %old, "failed to delete replaced image");
        }
    }

    info!(user_id = %user.id, ?kind, "profile image updated");
    Ok(updated.into())
}

pub async fn channel_profile(
    state: &AppState,
    username: &str,
    viewer: Uuid,
) -> ApiResult<ChannelProfile> {
    let username = normalize(Some(username))
        .ok_or_else(|| ApiError::validation("username is missing"))?;
    state
        .users
        .channel_profile(&username, viewer)
        .await?
        .ok_or_else(|| ApiError::NotFound("channel does not exists".into()))
}

pub async fn watch_history(state: &AppState, user_id: Uuid) -> ApiResult<Vec<WatchedVideo>> {
    Ok(state.users.watch_history(user_id).await?)
}
