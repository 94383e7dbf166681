use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;

use super::dto::UpdateAccountRequest;
use super::repo_types::{ChannelProfile, PublicUser, WatchedVideo};
use super::services::{self, ProfileImage};
use crate::{
    auth::extractors::AuthUser,
    error::ApiResult,
    media::MultipartForm,
    response::ApiResponse,
    state::AppState,
    JSON_BODY_LIMIT, MEDIA_BODY_LIMIT,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/c/:username", get(channel_profile))
        .route("/history", get(watch_history))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
}

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn current_user(AuthUser(user): AuthUser) -> ApiResponse<PublicUser> {
    ApiResponse::ok(user.into(), "User fetched successfully")
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let Json(body) = payload?;
    let updated = services::update_account(&state, user.id, &body.full_name, &body.email).await?;
    Ok(ApiResponse::ok(updated, "Account details updated successfully"))
}

async fn replace_image(
    state: &AppState,
    user: &super::repo_types::User,
    kind: ProfileImage,
    field: &str,
    mp: Multipart,
) -> ApiResult<PublicUser> {
    let mut form = MultipartForm::read(mp, &state.media).await?;
    let file = form.take_file(field);
    form.discard().await;
    services::replace_image(state, user, kind, file).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let updated = replace_image(&state, &user, ProfileImage::Avatar, "avatar", mp).await?;
    Ok(ApiResponse::ok(updated, "Avatar image updated successfully"))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let updated =
        replace_image(&state, &user, ProfileImage::CoverImage, "coverImage", mp).await?;
    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}

#[instrument(skip_all, fields(viewer = %user.id, %username))]
pub async fn channel_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let profile = services::channel_profile(&state, &username, user.id).await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn watch_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ApiResponse<Vec<WatchedVideo>>> {
    let history = services::watch_history(&state, user.id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
