use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Never serialized directly, see `PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,          // unique, lowercase
    pub email: String,             // unique, lowercase
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: String,     // Argon2 PHC string
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: String,
}

/// Public part of a user: everything except the password hash and refresh token.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            avatar: u.avatar,
            cover_image: u.cover_image,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Channel page: a user's public fields plus subscription counts.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channel_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

/// Flat row of the watch-history join.
#[derive(Debug, FromRow)]
pub struct WatchHistoryRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: i64,
    pub created_at: OffsetDateTime,
    pub owner_id: Option<Uuid>,
    pub owner_username: Option<String>,
    pub owner_full_name: Option<String>,
    pub owner_avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVideo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub owner: Option<VideoOwner>,
}

impl From<WatchHistoryRow> for WatchedVideo {
    fn from(r: WatchHistoryRow) -> Self {
        let owner = match (r.owner_id, r.owner_username, r.owner_full_name) {
            (Some(id), Some(username), Some(full_name)) => Some(VideoOwner {
                id,
                full_name,
                username,
                avatar: r.owner_avatar,
            }),
            _ => None,
        };
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            video_file: r.video_file,
            thumbnail: r.thumbnail,
            duration: r.duration,
            views: r.views,
            created_at: r.created_at,
            owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            full_name: "Alice".into(),
            avatar: Some("https://cdn.local/a.png".into()),
            cover_image: None,
            password_hash: "$argon2id$v=19$secret".into(),
            refresh_token: Some("refresh.jwt.value".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn public_user_omits_secrets() {
        let json = serde_json::to_string(&PublicUser::from(sample_user())).unwrap();
        assert!(json.contains("\"username\":\"alice\""));
        assert!(json.contains("fullName"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("refresh.jwt.value"));
        assert!(!json.to_lowercase().contains("password"));
        assert!(!json.contains("refreshToken"));
    }

    #[test]
    fn watch_row_without_owner_has_null_owner() {
        let row = WatchHistoryRow {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            video_file: "v".into(),
            thumbnail: "th".into(),
            duration: 12.5,
            views: 3,
            created_at: OffsetDateTime::now_utc(),
            owner_id: None,
            owner_username: None,
            owner_full_name: None,
            owner_avatar: None,
        };
        let video = WatchedVideo::from(row);
        assert!(video.owner.is_none());
        let json = serde_json::to_value(&video).unwrap();
        assert!(json["owner"].is_null());
    }
}
