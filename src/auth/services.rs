use tracing::{error, info, warn};
use uuid::Uuid;

use super::dto::RegisterInput;
use super::password::{hash_password, verify_password};
use super::tokens::TokenPair;
use crate::error::{ApiError, ApiResult};
use crate::media::discard;
use crate::state::AppState;
use crate::users::repo_types::{NewUser, PublicUser, User};
use crate::users::services::{is_valid_email, normalize};

/// Creates a user. Staged files in `input` are consumed: uploaded or removed.
pub async fn register(state: &AppState, mut input: RegisterInput) -> ApiResult<PublicUser> {
    let result = register_staged(state, &mut input).await;
    for path in [input.avatar.take(), input.cover_image.take()]
        .into_iter()
        .flatten()
    {
        discard(&path).await;
    }
    result
}

async fn register_staged(state: &AppState, input: &mut RegisterInput) -> ApiResult<PublicUser> {
    let full_name = input.full_name.as_deref().map(str::trim).unwrap_or_default();
    let email = normalize(input.email.as_deref()).unwrap_or_default();
    let username = normalize(input.username.as_deref()).unwrap_or_default();
    let password = input.password.as_deref().unwrap_or_default();

    let missing: Vec<String> = [
        ("fullName", full_name.is_empty()),
        ("email", email.is_empty()),
        ("username", username.is_empty()),
        ("password", password.trim().is_empty()),
    ]
    .into_iter()
    .filter(|(_, blank)| *blank)
    .map(|(name, _)| name.to_string())
    .collect();
    if !missing.is_empty() {
        warn!(?missing, "registration with blank fields");
        return Err(ApiError::validation_with("All fields are required", missing));
    }

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    if state
        .users
        .find_by_login(Some(username.as_str()), Some(email.as_str()))
        .await?
        .is_some()
    {
        warn!(%username, %email, "username or email already registered");
        return Err(ApiError::Conflict(
            "User with email or username already exists".into(),
        ));
    }

    let password_hash = hash_password(password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal("Something went wrong while registering the user".into())
    })?;

    let avatar_path = input
        .avatar
        .take()
        .ok_or_else(|| ApiError::validation("Avatar file is required"))?;

    let avatar = state.media.upload(&avatar_path).await.map_err(|e| {
        warn!(error = %e, "avatar upload failed");
        ApiError::validation("Avatar file is required")
    })?;

    let cover_image = match input.cover_image.take() {
        Some(path) => match state.media.upload(&path).await {
            Ok(m) => Some(m.url),
            Err(e) => {
                warn!(error = %e, "cover image upload failed; continuing without it");
                None
            }
        },
        None => None,
    };

    let created = state
        .users
        .create(NewUser {
            username,
            email,
            full_name: full_name.to_string(),
            avatar: Some(avatar.url.clone()),
            cover_image: cover_image.clone(),
            password_hash,
        })
        .await;
    let created = match created {
        Ok(user) => user,
        Err(e) => {
            // e.g. a concurrent registration took the username first
            let uploaded = [Some(avatar.url.as_str()), cover_image.as_deref()];
            state.media.remove_uploaded(uploaded.into_iter().flatten()).await;
            return Err(e.into());
        }
    };

    // read back through the store so the response reflects what was persisted
    let user = state
        .users
        .find_by_id(created.id)
        .await?
        .ok_or_else(|| {
            error!(user_id = %created.id, "created user not found on read-back");
            ApiError::Internal("Something went wrong while registering the user".into())
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Verifies credentials and issues a fresh token pair.
pub async fn login(
    state: &AppState,
    username: Option<&str>,
    email: Option<&str>,
    password: &str,
) -> ApiResult<(PublicUser, TokenPair)> {
    let username = normalize(username);
    let email = normalize(email);
    if username.is_none() && email.is_none() {
        return Err(ApiError::validation("username or email is required"));
    }

    let user = state
        .users
        .find_by_login(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| {
            warn!(?username, ?email, "login for unknown user");
            ApiError::NotFound("User does not exist".into())
        })?;

    if !check_password(&user, password)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let tokens = state.tokens.issue_token_pair(user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user.into(), tokens))
}

pub async fn logout(state: &AppState, user_id: Uuid) -> ApiResult<()> {
    state.tokens.revoke(user_id).await?;
    info!(%user_id, "user logged out");
    Ok(())
}

pub async fn change_password(
    state: &AppState,
    user: &User,
    old_password: &str,
    new_password: &str,
) -> ApiResult<()> {
    if old_password.is_empty() || new_password.trim().is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    if !check_password(user, old_password)? {
        warn!(user_id = %user.id, "change password with wrong old password");
        return Err(ApiError::validation("Invalid old password"));
    }
    let hash = hash_password(new_password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal("Something went wrong while changing the password".into())
    })?;
    if !state.users.update_password(user.id, &hash).await? {
        return Err(ApiError::NotFound("User does not exist".into()));
    }
    info!(user_id = %user.id, "password changed");
    Ok(())
}

fn check_password(user: &User, plain: &str) -> ApiResult<bool> {
    verify_password(plain, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        ApiError::Internal("Something went wrong while verifying credentials".into())
    })
}
