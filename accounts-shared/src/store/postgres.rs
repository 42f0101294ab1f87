/// PostgreSQL-backed store
///
/// A thin adapter from the storage traits onto the SQL defined alongside the
/// models.

use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;
use uuid::Uuid;

use super::{SessionStore, StoreError, UserStore};
use crate::db::pool;
use crate::models::{
    email::Email,
    session::Session,
    user::{NewUser, ProfileUpdate, User},
};

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: NewUser) -> Result<User, StoreError> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email(&self.pool, email.as_ref()).await?)
    }

    async fn email_exists(&self, email: &Email) -> Result<bool, StoreError> {
        Ok(User::email_exists(&self.pool, email.as_ref()).await?)
    }

    async fn activate_user(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(User::activate(&self.pool, id).await?)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        Ok(User::set_password(&self.pool, id, password_hash).await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        data: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        Ok(User::update_profile(&self.pool, id, data).await?)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(User::update_last_login(&self.pool, id).await?)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(User::delete(&self.pool, id).await?)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        Ok(User::list(&self.pool, limit, offset).await?)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(User::count(&self.pool).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(pool::health_check(&self.pool).await?)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, user_id: Uuid, ttl: Duration) -> Result<Session, StoreError> {
        Ok(Session::create(&self.pool, user_id, ttl).await?)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(Session::find_by_id(&self.pool, id).await?)
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Session::delete(&self.pool, id).await?)
    }

    async fn delete_user_sessions(
        &self,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        Ok(Session::delete_for_user(&self.pool, user_id, keep).await?)
    }

    async fn purge_expired_sessions(&self) -> Result<u64, StoreError> {
        Ok(Session::purge_expired(&self.pool).await?)
    }
}
