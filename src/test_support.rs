//! 测试用的内存实现

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    AppState,
    cache::CacheStore,
    config::{Config, OAuthCredentials},
    database::{
        AuthRepository, AuthUser, CommentRepository, MAX_USERNAME_ATTEMPTS, CommentRow, Identity, NewAuthUser,
        NewComment, NewProfile, NotificationPreferences, Profile, ProfileRepository,
        ProfileUpdate, StoreError,
    },
    error::AppError,
    oauth::{OAuthExchange, OAuthProfile, OAuthProvider},
    routes,
    utils::{generate_token, hash_password},
};

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/test".into(),
        redis_url: "redis://127.0.0.1/".into(),
        jwt_secret: "test-secret".into(),
        jwt_expiration_secs: 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 1000,
        action_rate_limit_attempts: 5,
        action_rate_limit_window_secs: 900,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        site_url: Some("https://app.example.com".into()),
        github: Some(OAuthCredentials {
            client_id: "github-client".into(),
            client_secret: "github-secret".into(),
        }),
        google: Some(OAuthCredentials {
            client_id: "google-client".into(),
            client_secret: "google-secret".into(),
        }),
        require_email_confirmation: true,
        secure_cookies: false,
        trust_proxy_headers: false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 不处理过期时间的内存缓存
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn increment(&self, key: &str, _window: Duration) -> Result<u64, StoreError> {
        let mut entries = lock(&self.entries);
        let count = entries
            .get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        entries.insert(key.to_string(), count.to_string());
        Ok(count)
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.entries).contains_key(key))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).remove(key))
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<AuthUser>,
    identities: Vec<Identity>,
    profiles: Vec<Profile>,
    comments: Vec<CommentRow>,
}

impl Tables {
    fn insert_user(
        &mut self,
        user: &NewAuthUser,
        max_username_attempts: u32,
    ) -> Result<AuthUser, StoreError> {
        let email = user.email.to_lowercase();
        if self.users.iter().any(|u| u.email == email) {
            return Err(StoreError::EmailTaken);
        }

        let now = Utc::now();
        let created = AuthUser {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash.clone(),
            raw_user_meta_data: Json(user.metadata.clone()),
            email_confirmed_at: user.email_confirmed.then_some(now),
            created_at: now,
        };

        // 与事务一致：资料行建不出来时用户也不落库
        let new = NewProfile::from_user_metadata(created.id, &created.email, &created.raw_user_meta_data);
        let username = (0..max_username_attempts)
            .map(|attempt| new.username_candidate(attempt))
            .find(|candidate| !self.profiles.iter().any(|p| &p.username == candidate))
            .ok_or(StoreError::UsernameTaken)?;

        self.users.push(created.clone());
        self.profiles.push(Profile {
            id: created.id,
            username,
            display_name: new.display_name,
            bio: None,
            avatar_url: new.avatar_url,
            notification_preferences: Json(NotificationPreferences::default()),
            updated_at: now,
        });
        Ok(created)
    }

    fn profile_mut(&mut self, id: Uuid) -> Result<&mut Profile, StoreError> {
        self.profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound("profile"))
    }
}

/// 同时实现三个存储接口的内存后端
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    sign_up_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn sign_up_calls(&self) -> usize {
        self.sign_up_calls.load(Ordering::SeqCst)
    }

    pub fn user_by_email(&self, email: &str) -> Option<AuthUser> {
        lock(&self.tables)
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        lock(&self.tables)
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn comment_ids(&self, post_id: Uuid) -> Vec<Uuid> {
        let tables = lock(&self.tables);
        let mut rows: Vec<&CommentRow> =
            tables.comments.iter().filter(|c| c.post_id == post_id).collect();
        rows.sort_by_key(|c| c.created_at);
        rows.into_iter().map(|c| c.id).collect()
    }
}

#[async_trait]
impl AuthRepository for MemoryBackend {
    async fn sign_up(&self, user: NewAuthUser) -> Result<AuthUser, StoreError> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.tables).insert_user(&user, 1)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, StoreError> {
        Ok(lock(&self.tables).users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, StoreError> {
        let email = email.to_lowercase();
        Ok(lock(&self.tables)
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn confirm_email(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound("user"))?;
        user.email_confirmed_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound("user"))?;
        user.password_hash = Some(password_hash.to_string());
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Err(StoreError::NotFound("user"));
        }
        tables.profiles.retain(|p| p.id != id);
        tables.identities.retain(|i| i.user_id != id);
        tables.comments.retain(|c| c.author_id != id);
        Ok(())
    }

    async fn identities(&self, user_id: Uuid) -> Result<Vec<Identity>, StoreError> {
        Ok(lock(&self.tables)
            .identities
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn sign_in_with_identity(&self, profile: &OAuthProfile) -> Result<AuthUser, StoreError> {
        let mut tables = lock(&self.tables);
        let provider = profile.provider.as_str();

        let linked = tables
            .identities
            .iter()
            .find(|i| i.provider == provider && i.provider_user_id == profile.provider_user_id)
            .map(|i| i.user_id);
        if let Some(user_id) = linked {
            return tables
                .users
                .iter()
                .find(|u| u.id == user_id)
                .cloned()
                .ok_or(StoreError::NotFound("user"));
        }

        let email = profile.email.to_lowercase();
        let existing = tables.users.iter().position(|u| u.email == email);
        let user = match existing {
            Some(index) => {
                let existing = &mut tables.users[index];
                if existing.email_confirmed_at.is_none() {
                    existing.password_hash = None;
                    existing.email_confirmed_at = Some(Utc::now());
                }
                existing.clone()
            }
            None => tables.insert_user(
                &NewAuthUser {
                    email,
                    password_hash: None,
                    metadata: profile.metadata.clone(),
                    email_confirmed: true,
                },
                MAX_USERNAME_ATTEMPTS,
            )?,
        };

        tables.identities.push(Identity {
            user_id: user.id,
            provider: provider.to_string(),
            provider_user_id: profile.provider_user_id.clone(),
            identity_data: Json(profile.metadata.clone()),
            created_at: Utc::now(),
        });
        Ok(user)
    }
}

#[async_trait]
impl ProfileRepository for MemoryBackend {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.profile(id))
    }

    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> Result<bool, StoreError> {
        Ok(lock(&self.tables)
            .profiles
            .iter()
            .any(|p| p.username == username && Some(p.id) != except))
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<Profile, StoreError> {
        let mut tables = lock(&self.tables);
        if tables
            .profiles
            .iter()
            .any(|p| p.username == username && p.id != id)
        {
            return Err(StoreError::UsernameTaken);
        }
        let profile = tables.profile_mut(id)?;
        profile.username = username.to_string();
        Ok(profile.clone())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Profile, StoreError> {
        let mut tables = lock(&self.tables);
        let profile = tables.profile_mut(id)?;
        profile.display_name = update.display_name.clone();
        profile.bio = update.bio.clone();
        profile.avatar_url = update.avatar_url.clone();
        Ok(profile.clone())
    }

    async fn update_notification_preferences(
        &self,
        id: Uuid,
        preferences: NotificationPreferences,
    ) -> Result<Profile, StoreError> {
        let mut tables = lock(&self.tables);
        let profile = tables.profile_mut(id)?;
        profile.notification_preferences = Json(preferences);
        Ok(profile.clone())
    }
}

#[async_trait]
impl CommentRepository for MemoryBackend {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRow>, StoreError> {
        Ok(lock(&self.tables)
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn find(&self, id: Uuid) -> Result<Option<CommentRow>, StoreError> {
        Ok(lock(&self.tables).comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, comment: &NewComment) -> Result<CommentRow, StoreError> {
        let mut tables = lock(&self.tables);
        let author = tables.profile_mut(comment.author_id)?.clone();
        let now = Utc::now();

        let row = CommentRow {
            id: Uuid::new_v4(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            parent_comment_id: comment.parent_comment_id,
            content: comment.content.clone(),
            created_at: now,
            updated_at: now,
            author_username: author.username,
            author_display_name: author.display_name,
            author_avatar_url: author.avatar_url,
        };
        tables.comments.push(row.clone());
        Ok(row)
    }
}

/// 只认 `good-code` 的授权码交换
pub struct FakeOAuth;

#[async_trait]
impl OAuthExchange for FakeOAuth {
    async fn exchange(
        &self,
        provider: OAuthProvider,
        _credentials: &OAuthCredentials,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<OAuthProfile, AppError> {
        if code != "good-code" {
            return Err(AppError::OAuth("bad verification code".into()));
        }
        Ok(OAuthProfile {
            provider,
            provider_user_id: "42".into(),
            email: "octo@example.com".into(),
            metadata: json!({
                "user_name": "Octo-Cat",
                "full_name": "Octo Cat",
                "avatar_url": "https://avatars.example.com/octo.png",
            }),
        })
    }
}

pub fn form(pairs: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

pub struct TestApp {
    pub server: TestServer,
    pub backend: Arc<MemoryBackend>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let mut config = test_config();
        customize(&mut config);

        let backend = Arc::new(MemoryBackend::default());
        let state = AppState::new(
            config,
            backend.clone(),
            backend.clone(),
            backend.clone(),
            Arc::new(MemoryCache::default()),
            Arc::new(FakeOAuth),
        )
        .unwrap();
        let server = TestServer::new(routes::router(state.clone())).unwrap();

        Self {
            server,
            backend,
            state,
        }
    }

    /// 创建已确认邮箱的用户
    pub async fn seed_user(&self, email: &str, username: &str, password: Option<&str>) -> AuthUser {
        let password_hash = password.map(|p| hash_password(p).unwrap());
        self.state
            .auth
            .sign_up(NewAuthUser {
                email: email.to_string(),
                password_hash,
                metadata: json!({ "user_name": username }),
                email_confirmed: true,
            })
            .await
            .unwrap()
    }

    pub fn token_for(&self, user: &AuthUser) -> String {
        generate_token(user.id, &user.email, &self.state.config)
            .unwrap()
            .0
    }
}
