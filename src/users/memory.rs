//! In-process `UserStore` used by unit tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{StoreError, StoreResult, UserStore};
use super::repo_types::{ChannelProfile, NewUser, User, VideoOwner, WatchedVideo};

#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    /// (subscriber, channel)
    subscriptions: Vec<(Uuid, Uuid)>,
    videos: Vec<StoredVideo>,
    /// (user, video) in watch order
    watch_history: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails the way a dropped database connection does.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    fn check_writes(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    pub fn subscribe(&self, subscriber: Uuid, channel: Uuid) {
        self.tables.lock().unwrap().subscriptions.push((subscriber, channel));
    }

    pub fn add_video(&self, owner_id: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().videos.push(StoredVideo {
            id,
            owner_id,
            title: title.into(),
        });
        id
    }

    pub fn watch(&self, user: Uuid, video: Uuid) {
        self.tables.lock().unwrap().watch_history.push((user, video));
    }

    pub fn remove_user(&self, id: Uuid) {
        self.tables.lock().unwrap().users.retain(|u| u.id != id);
    }

    pub fn stored_refresh_token(&self, id: Uuid) -> Option<String> {
        let t = self.tables.lock().unwrap();
        t.users
            .iter()
            .find(|u| u.id == id)
            .and_then(|u| u.refresh_token.clone())
    }

    fn modify<F>(&self, id: Uuid, f: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let mut t = self.tables.lock().unwrap();
        let user = t.users.iter_mut().find(|u| u.id == id)?;
        f(user);
        Some(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        self.check_writes()?;
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Duplicate("username".into()));
        }
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("email".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            avatar: new.avatar,
            cover_image: new.cover_image,
            password_hash: new.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .find(|u| Some(u.username.as_str()) == username || Some(u.email.as_str()) == email)
            .cloned())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<bool> {
        self.check_writes()?;
        Ok(self
            .modify(id, |u| u.refresh_token = token.map(str::to_owned))
            .is_some())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        self.check_writes()?;
        let mut t = self.tables.lock().unwrap();
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) if u.refresh_token.as_deref() == Some(expected) => {
                u.refresh_token = Some(next.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        self.check_writes()?;
        Ok(self
            .modify(id, |u| u.password_hash = password_hash.to_owned())
            .is_some())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        self.check_writes()?;
        {
            let t = self.tables.lock().unwrap();
            if t.users.iter().any(|u| u.id != id && u.email == email) {
                return Err(StoreError::Duplicate("email".into()));
            }
        }
        Ok(self.modify(id, |u| {
            u.full_name = full_name.to_owned();
            u.email = email.to_owned();
            u.updated_at = OffsetDateTime::now_utc();
        }))
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> StoreResult<Option<User>> {
        self.check_writes()?;
        Ok(self.modify(id, |u| u.avatar = Some(url.to_owned())))
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> StoreResult<Option<User>> {
        self.check_writes()?;
        Ok(self.modify(id, |u| u.cover_image = Some(url.to_owned())))
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> StoreResult<Option<ChannelProfile>> {
        let t = self.tables.lock().unwrap();
        let Some(u) = t.users.iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        let incoming: Vec<Uuid> = t
            .subscriptions
            .iter()
            .filter(|(_, channel)| *channel == u.id)
            .map(|(subscriber, _)| *subscriber)
            .collect();
        let outgoing = t
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == u.id)
            .count();
        Ok(Some(ChannelProfile {
            id: u.id,
            full_name: u.full_name.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            avatar: u.avatar.clone(),
            cover_image: u.cover_image.clone(),
            subscribers_count: incoming.len() as i64,
            channel_subscribed_to_count: outgoing as i64,
            is_subscribed: incoming.contains(&viewer),
        }))
    }

    async fn watch_history(&self, id: Uuid) -> StoreResult<Vec<WatchedVideo>> {
        let t = self.tables.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        let videos = t
            .watch_history
            .iter()
            .filter(|(user, _)| *user == id)
            .filter_map(|(_, video)| t.videos.iter().find(|v| v.id == *video))
            .map(|v| WatchedVideo {
                id: v.id,
                title: v.title.clone(),
                description: String::new(),
                video_file: format!("https://cdn.local/videos/{}.mp4", v.id),
                thumbnail: format!("https://cdn.local/thumbs/{}.png", v.id),
                duration: 0.0,
                views: 0,
                created_at: now,
                owner: t.users.iter().find(|u| u.id == v.owner_id).map(|o| VideoOwner {
                    id: o.id,
                    full_name: o.full_name.clone(),
                    username: o.username.clone(),
                    avatar: o.avatar.clone(),
                }),
            })
            .collect();
        Ok(videos)
    }
}
