/// Profile endpoints for the signed-in account
///
/// Every handler acts on the account bound to the caller's session. None of
/// them take an account id, and ids in submitted bodies are ignored.

use accounts_shared::{
    auth::middleware::AuthContext,
    models::{phone::PhoneNumber, user::{ProfileUpdate, User}},
};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::{FieldErrors, FormField, Page},
    notice::Outcome,
};

const UPDATE_FIELDS: &[&str] = &["first_name", "last_name", "phone"];

/// Read-only view of an account
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub title: &'static str,
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,

    /// E.164
    pub phone: String,

    pub phone_national: String,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            title: "Profile",
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone: user.phone.clone(),
            phone_national: user.national_phone(),
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

/// Profile update request
///
/// `email` is accepted so a client can post the whole form back, but it is
/// never applied.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,

    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub phone: String,

    pub email: Option<String>,
}

/// Current account
pub async fn view(Extension(auth): Extension<AuthContext>) -> Json<ProfileView> {
    Json(ProfileView::from(&auth.user))
}

/// Update form with the account's current values
pub async fn update_page(Extension(auth): Extension<AuthContext>) -> Page {
    let user = &auth.user;

    Page::new("Update Profile")
        .subtitle("Change your personal information")
        .field(FormField::new("email", "e-mail", "email").disabled().value(&user.email))
        .field(
            FormField::new("first_name", "First name", "text")
                .optional()
                .value(&user.first_name),
        )
        .field(
            FormField::new("last_name", "Last name", "text")
                .optional()
                .value(&user.last_name),
        )
        .field(FormField::new("phone", "Phone Number", "tel").value(user.national_phone()))
}

/// Updates names and phone of the caller's account
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing or invalid phone, over-long names
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Outcome> {
    let mut errors = FieldErrors::from_validation(req.validate(), UPDATE_FIELDS);

    if req.email.as_deref().is_some_and(|e| !e.eq_ignore_ascii_case(&auth.user.email)) {
        tracing::debug!(user_id = %auth.user_id(), "Ignoring submitted email on profile update");
    }

    let phone = if errors.has("phone") {
        None
    } else {
        match PhoneNumber::parse(&req.phone, state.config.site.default_calling_code) {
            Ok(phone) => Some(phone),
            Err(e) => {
                errors.add("phone", e.to_string());
                None
            }
        }
    };

    let phone = match phone {
        Some(phone) if errors.is_empty() => phone,
        _ => return Err(errors.into_error()),
    };

    let user = state
        .users
        .update_profile(
            auth.user_id(),
            ProfileUpdate {
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                phone,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Account no longer exists".to_string()))?;

    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Outcome::redirect("/profile/").success(
        "profile_updated",
        format!("Dear \"{}\", your profile has been updated", user.email),
    ))
}

/// Delete confirmation descriptor
pub async fn delete_page() -> Page {
    Page::new("Delete Account")
        .message("Are you sure you want to delete your account? This cannot be undone.")
}

/// Deletes the caller's account along with all of its sessions
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Outcome> {
    if !state.users.delete_user(auth.user_id()).await? {
        return Err(ApiError::NotFound("Account no longer exists".to_string()));
    }

    tracing::info!(user_id = %auth.user_id(), "Account deleted");

    Ok(Outcome::redirect("/login/"))
}
