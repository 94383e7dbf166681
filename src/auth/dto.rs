use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::tokens::TokenPair;
use crate::users::repo_types::PublicUser;

/// Registration form after multipart parsing; files are staged local paths.
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<PathBuf>,
    pub cover_image: Option<PathBuf>,
}

/// Request body for login. Either `username` or `email` identifies the user.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// Request body for token refresh; the `refreshToken` cookie takes precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}
