use std::time::Duration;

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

use super::tokens::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Attributes shared by both token cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

fn render(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn append(headers: &mut HeaderMap, cookie: String) {
    // JWTs and our attribute set are plain ASCII
    if let Ok(v) = HeaderValue::from_str(&cookie) {
        headers.append(SET_COOKIE, v);
    }
}

/// `Set-Cookie` headers carrying both tokens.
pub fn token_cookies(pair: &TokenPair, policy: CookiePolicy) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append(
        &mut headers,
        render(
            ACCESS_TOKEN_COOKIE,
            &pair.access_token,
            policy.access_max_age.as_secs(),
            policy.secure,
        ),
    );
    append(
        &mut headers,
        render(
            REFRESH_TOKEN_COOKIE,
            &pair.refresh_token,
            policy.refresh_max_age.as_secs(),
            policy.secure,
        ),
    );
    headers
}

/// `Set-Cookie` headers expiring both tokens.
pub fn cleared_cookies(policy: CookiePolicy) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append(&mut headers, render(ACCESS_TOKEN_COOKIE, "", 0, policy.secure));
    append(&mut headers, render(REFRESH_TOKEN_COOKIE, "", 0, policy.secure));
    headers
}

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
