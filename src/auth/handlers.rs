use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    cookies::{cleared_cookies, read_cookie, token_cookies, REFRESH_TOKEN_COOKIE},
    dto::{ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterInput},
    extractors::AuthUser,
    services,
    tokens::TokenPair,
};
use crate::{
    error::ApiResult, media::MultipartForm, response::ApiResponse, state::AppState,
    users::repo_types::PublicUser, JSON_BODY_LIMIT, MEDIA_BODY_LIMIT,
};

pub fn auth_routes() -> Router<AppState> {
    let session = Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh))
        .route("/change-password", post(change_password))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));
    let registration = Router::new()
        .route("/register", post(register))
        .layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT));
    session.merge(registration)
}

/// POST /register (multipart: fullName, email, username, password, avatar, coverImage?)
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut form = MultipartForm::read(mp, &state.media).await?;
    let input = RegisterInput {
        full_name: form.text("fullName").map(str::to_owned),
        email: form.text("email").map(str::to_owned),
        username: form.text("username").map(str::to_owned),
        password: form.text("password").map(str::to_owned),
        avatar: form.take_file("avatar"),
        cover_image: form.take_file("coverImage"),
    };
    form.discard().await;

    let user = services::register(&state, input).await?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered Successfully",
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(HeaderMap, ApiResponse<LoginResponse>)> {
    let Json(body) = payload?;
    let (user, tokens) = services::login(
        &state,
        body.username.as_deref(),
        body.email.as_deref(),
        &body.password,
    )
    .await?;

    let cookies = token_cookies(&tokens, state.cookie_policy());
    Ok((
        cookies,
        ApiResponse::ok(LoginResponse { user, tokens }, "User logged In Successfully"),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<(HeaderMap, ApiResponse<Value>)> {
    services::logout(&state, user.id).await?;
    Ok((
        cleared_cookies(state.cookie_policy()),
        ApiResponse::ok(json!({}), "User logged Out"),
    ))
}

/// POST /refresh-token. The cookie wins over the body field.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> ApiResult<(HeaderMap, ApiResponse<TokenPair>)> {
    let presented = read_cookie(&headers, REFRESH_TOKEN_COOKIE)
        .or_else(|| payload.and_then(|Json(body)| body.refresh_token));

    let tokens = state
        .tokens
        .rotate_refresh_token(presented.as_deref())
        .await?;

    let cookies = token_cookies(&tokens, state.cookie_policy());
    Ok((cookies, ApiResponse::ok(tokens, "Access token refreshed")))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<Value>> {
    let Json(body) = payload?;
    services::change_password(&state, &user, &body.old_password, &body.new_password).await?;
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}
