use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::repo_types::{ChannelProfile, NewUser, User, WatchHistoryRow, WatchedVideo};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column (username or email) already holds the value.
    #[error("duplicate value for {0}")]
    Duplicate(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for user records and the read-only views derived from them.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Matches either the username or the email; `None` never matches.
    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>>;

    /// Overwrites (or clears with `None`) the stored refresh token.
    /// Returns `false` when no such user exists.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<bool>;

    /// Replaces the stored refresh token with `next` only if it currently
    /// equals `expected`, in one atomic step. Returns whether the swap happened.
    async fn swap_refresh_token(&self, id: Uuid, expected: &str, next: &str)
        -> StoreResult<bool>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> StoreResult<Option<User>>;

    async fn update_avatar(&self, id: Uuid, url: &str) -> StoreResult<Option<User>>;

    async fn update_cover_image(&self, id: Uuid, url: &str) -> StoreResult<Option<User>>;

    /// Channel page for `username` as seen by `viewer`.
    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> StoreResult<Option<ChannelProfile>>;

    /// Watched videos of `id` in watch order, each with its owner's public fields.
    async fn watch_history(&self, id: Uuid) -> StoreResult<Vec<WatchedVideo>>;
}

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
                            password_hash, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Maps a Postgres unique violation onto `StoreError::Duplicate`.
fn map_unique(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => "email",
                Some(c) if c.contains("username") => "username",
                _ => "unique key",
            };
            return StoreError::Duplicate(field.into());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.avatar)
        .bind(&new.cover_image)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(user)
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $2
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        // NULL never compares equal, so a cleared token can't be swapped.
        let res = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token = $3
             WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET full_name = $2, email = $3, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET avatar = $2, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET cover_image = $2, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> StoreResult<Option<ChannelProfile>> {
        // subscribers: edges pointing at the channel; subscribed-to: edges leaving it.
        let profile = sqlx::query_as::<_, ChannelProfile>(
            r#"
            SELECT u.id, u.full_name, u.username, u.email, u.avatar, u.cover_image,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                       AS subscribers_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                       AS channel_subscribed_to_count,
                   EXISTS (SELECT 1 FROM subscriptions s
                            WHERE s.channel_id = u.id AND s.subscriber_id = $2)
                       AS is_subscribed
              FROM users u
             WHERE u.username = $1
            "#,
        )
        .bind(username)
        .bind(viewer)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn watch_history(&self, id: Uuid) -> StoreResult<Vec<WatchedVideo>> {
        let rows = sqlx::query_as::<_, WatchHistoryRow>(
            r#"
            SELECT v.id, v.title, v.description, v.video_file, v.thumbnail,
                   v.duration, v.views, v.created_at,
                   o.id AS owner_id, o.username AS owner_username,
                   o.full_name AS owner_full_name, o.avatar AS owner_avatar
              FROM watch_history w
              JOIN videos v ON v.id = w.video_id
              LEFT JOIN users o ON o.id = v.owner_id
             WHERE w.user_id = $1
             ORDER BY w.position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(WatchedVideo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@x.com"),
            full_name: name.to_uppercase(),
            avatar: None,
            cover_image: None,
            password_hash: "hash".into(),
        }
    }

    async fn add_video(pool: &PgPool, owner: Option<Uuid>, title: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO videos (owner_id, video_file, thumbnail, title) \
             VALUES ($1, 'v.mp4', 't.png', $2) RETURNING id",
        )
        .bind(owner)
        .bind(title)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn subscribe(pool: &PgPool, subscriber: Uuid, channel: Uuid) {
        sqlx::query("INSERT INTO subscriptions (subscriber_id, channel_id) VALUES ($1, $2)")
            .bind(subscriber)
            .bind(channel)
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test]
    async fn swap_only_replaces_the_expected_token(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let user = store.create(new_user("alice")).await.unwrap();
        assert!(user.refresh_token.is_none());

        assert!(store.set_refresh_token(user.id, Some("t1")).await.unwrap());
        assert!(store.swap_refresh_token(user.id, "t1", "t2").await.unwrap());
        assert!(!store.swap_refresh_token(user.id, "t1", "t3").await.unwrap());
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("t2"));

        // a cleared token never matches
        assert!(store.set_refresh_token(user.id, None).await.unwrap());
        assert!(!store.swap_refresh_token(user.id, "t2", "t4").await.unwrap());
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());

        assert!(!store
            .set_refresh_token(Uuid::new_v4(), Some("t5"))
            .await
            .unwrap());
    }

    #[sqlx::test]
    async fn channel_profile_counts_edges_by_direction(pool: PgPool) {
        let store = PgUserStore::new(pool.clone());
        let chan = store.create(new_user("chan")).await.unwrap();
        let viewer = store.create(new_user("viewer")).await.unwrap();
        let a = store.create(new_user("a")).await.unwrap();
        let b = store.create(new_user("b")).await.unwrap();
        let other = store.create(new_user("other")).await.unwrap();

        subscribe(&pool, viewer.id, chan.id).await;
        subscribe(&pool, a.id, chan.id).await;
        subscribe(&pool, b.id, chan.id).await;
        subscribe(&pool, chan.id, other.id).await;

        let profile = store.channel_profile("chan", viewer.id).await.unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 3);
        assert_eq!(profile.channel_subscribed_to_count, 1);
        assert!(profile.is_subscribed);

        let seen_by_other = store.channel_profile("chan", other.id).await.unwrap().unwrap();
        assert!(!seen_by_other.is_subscribed);

        assert!(store.channel_profile("ghost", viewer.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn watch_history_keeps_order_and_tolerates_missing_owner(pool: PgPool) {
        let store = PgUserStore::new(pool.clone());
        let me = store.create(new_user("me")).await.unwrap();
        let creator = store.create(new_user("creator")).await.unwrap();
        let first = add_video(&pool, Some(creator.id), "first").await;
        let orphan = add_video(&pool, None, "orphan").await;
        let second = add_video(&pool, Some(creator.id), "second").await;

        for (position, video) in [second, orphan, first].into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO watch_history (user_id, video_id, position) VALUES ($1, $2, $3)",
            )
            .bind(me.id)
            .bind(video)
            .bind(position as i32)
            .execute(&pool)
            .await
            .unwrap();
        }

        let history = store.watch_history(me.id).await.unwrap();
        let titles: Vec<&str> = history.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "orphan", "first"]);
        assert_eq!(history[0].owner.as_ref().unwrap().username, "creator");
        assert!(history[1].owner.is_none());

        assert!(store.watch_history(creator.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn unique_violations_name_the_column(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let alice = store.create(new_user("alice")).await.unwrap();
        store.create(new_user("bob")).await.unwrap();

        let mut same_name = new_user("alice");
        same_name.email = "other@x.com".into();
        match store.create(same_name).await.unwrap_err() {
            StoreError::Duplicate(field) => assert_eq!(field, "username"),
            other => panic!("expected Duplicate, got {other:?}"),
        }

        let mut same_email = new_user("carol");
        same_email.email = "alice@x.com".into();
        match store.create(same_email).await.unwrap_err() {
            StoreError::Duplicate(field) => assert_eq!(field, "email"),
            other => panic!("expected Duplicate, got {other:?}"),
        }

        match store
            .update_account(alice.id, "Alice", "bob@x.com")
            .await
            .unwrap_err()
        {
            StoreError::Duplicate(field) => assert_eq!(field, "email"),
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }
}
