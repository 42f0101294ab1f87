/// Staff-only account administration
///
/// Mounted under `/admin` behind the session and staff checks.
///
/// - `GET /admin/users/?page=&per_page=` - Accounts ordered by email
/// - `GET /admin/users/:id/` - One account laid out as edit-form fieldsets

use accounts_shared::{auth::password::describe_hash, models::user::User};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

pub const DEFAULT_PER_PAGE: i64 = 100;
pub const MAX_PER_PAGE: i64 = 500;

/// Pagination query
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,

    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

/// One row of the account list
#[derive(Debug, Serialize, Deserialize)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// National format
    pub phone: String,

    pub is_staff: bool,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.national_phone(),
            is_staff: user.is_staff,
        }
    }
}

/// Account list page
#[derive(Debug, Serialize, Deserialize)]
pub struct UserList {
    pub columns: Vec<String>,
    pub users: Vec<UserRow>,
    pub page: i64,
    pub per_page: i64,
    pub count: i64,
}

/// A titled group of fields on the edit form
#[derive(Debug, Serialize)]
pub struct Fieldset {
    pub title: Option<&'static str>,
    pub fields: Vec<AdminField>,
}

#[derive(Debug, Serialize)]
pub struct AdminField {
    pub name: &'static str,
    pub value: Value,
}

fn field(name: &'static str, value: Value) -> AdminField {
    AdminField { name, value }
}

/// Edit-form layout of one account
#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub id: Uuid,
    pub fieldsets: Vec<Fieldset>,
}

impl From<&User> for UserDetail {
    fn from(user: &User) -> Self {
        let fieldsets = vec![
            Fieldset {
                title: None,
                fields: vec![
                    field("email", json!(user.email)),
                    field("password", json!(describe_hash(&user.password_hash))),
                ],
            },
            Fieldset {
                title: Some("Personal info"),
                fields: vec![
                    field("first_name", json!(user.first_name)),
                    field("last_name", json!(user.last_name)),
                    field("phone", json!(user.national_phone())),
                ],
            },
            Fieldset {
                title: Some("Permissions"),
                fields: vec![
                    field("is_active", json!(user.is_active)),
                    field("is_staff", json!(user.is_staff)),
                    field("is_superuser", json!(user.is_superuser)),
                ],
            },
            Fieldset {
                title: Some("Important dates"),
                fields: vec![
                    field("last_login", json!(user.last_login)),
                    field("date_joined", json!(user.date_joined)),
                ],
            },
        ];

        Self {
            id: user.id,
            fieldsets,
        }
    }
}

/// Lists accounts ordered by email
///
/// # Errors
///
/// - `400 Bad Request`: `page` below 1 or `per_page` outside 1..=500
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<UserList>> {
    if query.page < 1 {
        return Err(ApiError::BadRequest("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PER_PAGE).contains(&query.per_page) {
        return Err(ApiError::BadRequest(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }

    let offset = (query.page - 1).saturating_mul(query.per_page);
    let users = state.users.list_users(query.per_page, offset).await?;
    let count = state.users.count_users().await?;

    Ok(Json(UserList {
        columns: ["email", "first_name", "last_name", "phone", "is_staff"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        users: users.iter().map(UserRow::from).collect(),
        page: query.page,
        per_page: query.per_page,
        count,
    }))
}

/// Shows one account as edit-form fieldsets
///
/// # Errors
///
/// - `404 Not Found`: No account with that id
pub async fn user_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserDetail>> {
    let user = state
        .users
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserDetail::from(&user)))
}
