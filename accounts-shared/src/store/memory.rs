/// In-memory store
///
/// Used by the test suite and when the server runs without `DATABASE_URL`.
/// Data lives for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionStore, StoreError, UserStore};
use crate::models::{
    email::Email,
    session::Session,
    user::{NewUser, ProfileUpdate, User},
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
}

/// Store holding users and sessions behind a single lock
///
/// One lock covers both maps so deleting a user and its sessions is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions of a user
    pub async fn session_count(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == data.email.as_ref()) {
            return Err(StoreError::DuplicateEmail);
        }

        let user = User::from_new(data);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email.as_ref())
            .cloned())
    }

    async fn email_exists(&self, email: &Email) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .any(|u| u.email == email.as_ref()))
    }

    async fn activate_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) if !user.is_active => {
                user.is_active = true;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        id: Uuid,
        data: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(&id).map(|user| {
            user.first_name = data.first_name;
            user.last_name = data.last_name;
            user.phone = data.phone.as_e164();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.last_login = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner.users.remove(&id).is_some();
        if removed {
            inner.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));

        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.users.len() as i64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, user_id: Uuid, ttl: Duration) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;

        // Mirrors the foreign key on the sessions table
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::Database(format!(
                "session references unknown user {}",
                user_id
            )));
        }

        let session = Session::start(user_id, ttl);
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.sessions.remove(&id).is_some())
    }

    async fn delete_user_sessions(
        &self,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|id, s| s.user_id != user_id || Some(*id) == keep);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn purge_expired_sessions(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| !s.is_expired());
        Ok((before - inner.sessions.len()) as u64)
    }
}
