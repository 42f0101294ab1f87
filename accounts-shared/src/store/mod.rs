/// Storage layer
///
/// Handlers talk to storage through two traits so the same code runs against
/// PostgreSQL in production and an in-memory store in tests and local
/// development.
///
/// # Implementations
///
/// - [`postgres::PgStore`]: sqlx-backed, delegates to the model SQL
/// - [`memory::MemoryStore`]: `RwLock<HashMap>`-backed
///
/// Both enforce email uniqueness atomically: PostgreSQL through the
/// `users_email_key` constraint, the memory store by holding its write lock
/// across the check and the insert.

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::models::{
    email::Email,
    session::Session,
    user::{NewUser, ProfileUpdate, User},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Email uniqueness violated
    #[error("A user with that email already exists")]
    DuplicateEmail,

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Database(err.to_string())
    }
}

/// User account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new account, failing with `DuplicateEmail` if the email is taken
    async fn create_user(&self, data: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    async fn email_exists(&self, email: &Email) -> Result<bool, StoreError>;

    /// Flips an inactive account active; false if missing or already active
    async fn activate_user(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        data: ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;

    async fn touch_last_login(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Deletes the account and all of its sessions
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Users ordered by email
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;

    async fn count_users(&self) -> Result<i64, StoreError>;

    /// Verifies the backend is reachable
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Login session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, user_id: Uuid, ttl: Duration) -> Result<Session, StoreError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Deletes every session of `user_id` except `keep`
    async fn delete_user_sessions(
        &self,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, StoreError>;

    /// Removes expired sessions, returning how many were deleted
    async fn purge_expired_sessions(&self) -> Result<u64, StoreError>;
}
