/// User account model and database operations
///
/// The email address is the login identifier. Accounts are created inactive
/// and flipped active once the emailed activation link is consumed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     email TEXT NOT NULL UNIQUE,  -- plus a unique index on lower(email)
///     phone VARCHAR(16) NOT NULL,
///     first_name VARCHAR(150) NOT NULL DEFAULT '',
///     last_name VARCHAR(150) NOT NULL DEFAULT '',
///     password_hash VARCHAR(255) NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT FALSE,
///     is_staff BOOLEAN NOT NULL DEFAULT FALSE,
///     is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
///     date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use accounts_shared::models::{email::Email, phone::PhoneNumber, user::{NewUser, User}};
/// use accounts_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, NewUser::inactive(
///     Email::parse("user@example.com")?,
///     PhoneNumber::parse("+14155550123", 1)?,
///     "$argon2id$...".to_string(),
/// )).await?;
///
/// let found = User::find_by_email(&pool, "user@example.com").await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{email::Email, phone::PhoneNumber};

const USER_COLUMNS: &str = "id, email, phone, first_name, last_name, password_hash, \
     is_active, is_staff, is_superuser, date_joined, updated_at, last_login";

/// User model representing an account
///
/// Passwords are stored as Argon2id hashes and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Lowercased email address, unique across all users
    pub email: String,

    /// Phone number in E.164 format
    pub phone: String,

    pub first_name: String,

    pub last_name: String,

    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// False until the activation link has been consumed
    pub is_active: bool,

    /// May access the administrative listing
    pub is_staff: bool,

    pub is_superuser: bool,

    pub date_joined: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never)
    pub last_login: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub phone: PhoneNumber,
    /// Argon2id hash, never the plaintext password
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    /// A regular account awaiting email activation
    pub fn inactive(email: Email, phone: PhoneNumber, password_hash: String) -> Self {
        Self {
            email,
            phone,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            is_active: false,
            is_staff: false,
            is_superuser: false,
        }
    }

    /// An active staff superuser, used for bootstrapping administrators
    pub fn superuser(email: Email, phone: PhoneNumber, password_hash: String) -> Self {
        Self {
            is_active: true,
            is_staff: true,
            is_superuser: true,
            ..Self::inactive(email, phone, password_hash)
        }
    }
}

/// Fields a user may change on their own profile
///
/// The email address is deliberately absent: it is immutable once registered.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: PhoneNumber,
}

impl User {
    /// Builds an in-memory user record from creation data
    pub fn from_new(data: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: data.email.as_ref().to_string(),
            phone: data.phone.as_e164(),
            first_name: data.first_name,
            last_name: data.last_name,
            password_hash: data.password_hash,
            is_active: data.is_active,
            is_staff: data.is_staff,
            is_superuser: data.is_superuser,
            date_joined: now,
            updated_at: now,
            last_login: None,
        }
    }

    /// Parsed phone number, if the stored value is well-formed
    pub fn phone_number(&self) -> Option<PhoneNumber> {
        PhoneNumber::from_e164(&self.phone).ok()
    }

    /// Phone rendered in national format, falling back to the stored value
    pub fn national_phone(&self) -> String {
        self.phone_number()
            .map(|p| p.as_national())
            .unwrap_or_else(|| self.phone.clone())
    }

    /// "First Last", trimmed; empty when neither name is set
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists (unique constraint
    /// violation) or the database connection fails.
    pub async fn create(pool: &PgPool, data: NewUser) -> Result<Self, sqlx::Error> {
        let record = Self::from_new(data);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, phone, first_name, last_name, password_hash,
                               is_active, is_staff, is_superuser, date_joined, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(record.id)
        .bind(record.email)
        .bind(record.phone)
        .bind(record.first_name)
        .bind(record.last_name)
        .bind(record.password_hash)
        .bind(record.is_active)
        .bind(record.is_staff)
        .bind(record.is_superuser)
        .bind(record.date_joined)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by (already normalized) email address
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Checks whether an account with this email exists
    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))")
            .bind(email)
            .fetch_one(pool)
            .await
    }

    /// Marks an inactive account active
    ///
    /// Returns false if the user doesn't exist or was already active.
    pub async fn activate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = TRUE, updated_at = NOW()
            WHERE id = $1 AND is_active = FALSE
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the password hash
    pub async fn set_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a profile update
    ///
    /// Returns the updated user, or None if the user doesn't exist.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: ProfileUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, phone = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.phone.as_e164())
        .fetch_optional(pool)
        .await
    }

    /// Deletes a user by ID
    ///
    /// Sessions are removed by the `ON DELETE CASCADE` foreign key.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a user
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users ordered by email, with pagination
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY email ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
