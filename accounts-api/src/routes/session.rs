/// Login and logout endpoints
///
/// - `GET /login/` - Login form descriptor
/// - `POST /login/` - Verify credentials and open a session
/// - `GET /logout/` - Logout confirmation descriptor
/// - `POST /logout/` - Close the current session

use accounts_shared::{
    auth::{
        jwt::{create_token, Claims},
        middleware::AuthContext,
        password,
    },
    models::email::Email,
};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::AppState,
    error::ApiResult,
    forms::{check_captcha, FieldErrors, FormField, Page, NON_FIELD},
    notice::Outcome,
};

pub const INVALID_LOGIN: &str =
    "Please enter a correct email and password. Note that both fields may be case-sensitive.";
pub const LOGGED_OUT: &str = "You have been logged out.";

const FIELDS: &[&str] = &["email", "password", "captcha", NON_FIELD];

/// Login request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub email: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub password: String,

    pub captcha: String,
}

/// Login response
///
/// The access token is only usable while its session row exists.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,

    /// Always "Bearer"
    pub token_type: &'static str,

    pub expires_at: DateTime<Utc>,

    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Login form descriptor
pub async fn login_page(State(state): State<AppState>) -> Page {
    Page::new("Login")
        .field(FormField::new("email", "e-mail", "email"))
        .field(FormField::new("password", "Password", "password"))
        .with_captcha(state.captcha.as_ref())
}

/// Opens a session for an active account
///
/// Unknown emails, wrong passwords and inactive accounts all produce the
/// same form-wide error.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing fields, failed CAPTCHA or bad
///   credentials
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let mut errors = FieldErrors::from_validation(req.validate(), FIELDS);
    check_captcha(state.captcha.as_ref(), &req.captcha, &mut errors).await;
    errors.into_result()?;

    let user = match Email::parse(&req.email) {
        Ok(email) => state.users.find_user_by_email(&email).await?,
        Err(_) => None,
    };

    let user = match user {
        Some(user) => {
            let matches =
                password::verify_password_async(req.password, user.password_hash.clone()).await?;
            if matches && user.is_active {
                Some(user)
            } else {
                tracing::warn!(user_id = %user.id, active = user.is_active, "Login rejected");
                None
            }
        }
        None => {
            password::verify_dummy_password_async(req.password).await;
            tracing::warn!("Login attempt for unknown email");
            None
        }
    };

    let Some(user) = user else {
        let mut errors = FieldErrors::new(FIELDS);
        errors.add(NON_FIELD, INVALID_LOGIN);
        return Err(errors.into_error());
    };

    let session = state
        .sessions
        .create_session(user.id, state.config.session_ttl())
        .await?;
    state.users.touch_last_login(user.id).await?;

    let claims = Claims::until(user.id, session.id, session.expires_at);
    let access_token = create_token(&claims, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, session_id = %session.id, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_at: session.expires_at,
        outcome: Outcome::redirect("/profile/"),
    }))
}

/// Logout confirmation descriptor
pub async fn logout_page() -> Page {
    Page::new("Logout").message("Are you sure you want to log out?")
}

/// Deletes the caller's session, revoking its access token
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Outcome> {
    state.sessions.delete_session(auth.session_id).await?;

    tracing::info!(user_id = %auth.user_id(), session_id = %auth.session_id, "User logged out");

    Ok(Outcome::redirect("/login/").info("logged_out", LOGGED_OUT))
}
