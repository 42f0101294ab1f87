/// Password reset by email and password change
///
/// # Reset flow
///
/// 1. `POST /password/reset/` emails a link to an active account
/// 2. `GET /password/reset/:uidb64/:token/` tells the client whether the link is usable
/// 3. `POST /password/reset/:uidb64/:token/` stores the new password and revokes every session
///
/// The reset request answers identically whether or not the email is
/// registered. A reset token covers the password hash, so it stops verifying
/// once used.
///
/// # Change flow
///
/// `POST /password/change/` requires the old password and keeps only the
/// caller's own session.

use accounts_shared::{
    auth::{middleware::AuthContext, password, tokens::encode_uid},
    mail::templates::password_reset_email,
    models::{email::Email, user::User},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    app::AppState,
    error::ApiResult,
    forms::{check_captcha, check_new_password, FieldErrors, FormField, Page},
    notice::Outcome,
};

pub const INVALID_RESET_LINK: &str = "The password reset link was invalid, possibly because it has already been used. Please request a new password reset.";
pub const WRONG_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";
pub const PASSWORD_CHANGED: &str = "Your password has been changed successfully.";

const RESET_FIELDS: &[&str] = &["email", "captcha"];
const SET_FIELDS: &[&str] = &["new_password1", "new_password2"];
const CHANGE_FIELDS: &[&str] = &["old_password", "new_password1", "new_password2"];

/// Reset request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ResetRequest {
    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub email: String,

    pub captcha: String,
}

/// New password pair, used by reset confirmation
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SetPasswordRequest {
    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub new_password1: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub new_password2: String,
}

/// Password change request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub old_password: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub new_password1: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub new_password2: String,
}

fn new_password_fields(page: Page) -> Page {
    page.field(FormField::new("new_password1", "New password", "password"))
        .field(FormField::new(
            "new_password2",
            "New password confirmation",
            "password",
        ))
}

/// Validates a new password pair for `user` and returns its hash
async fn new_password_hash(
    mut errors: FieldErrors,
    user: &User,
    first: &str,
    second: &str,
) -> ApiResult<String> {
    check_new_password(&mut errors, first, second, "new_password2", &user.email);
    errors.into_result()?;
    Ok(password::hash_password_async(second.to_string()).await?)
}

/// Reset request form descriptor
pub async fn reset_page(State(state): State<AppState>) -> Page {
    Page::new("Reset Password")
        .field(FormField::new("email", "e-mail", "email"))
        .with_captcha(state.captcha.as_ref())
}

/// Emails a reset link if the address belongs to an active account
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing or malformed email, failed CAPTCHA
pub async fn reset(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> ApiResult<Outcome> {
    let mut errors = FieldErrors::from_validation(req.validate(), RESET_FIELDS);

    let email = if errors.has("email") {
        None
    } else {
        match Email::parse(&req.email) {
            Ok(email) => Some(email),
            Err(e) => {
                errors.add("email", e.to_string());
                None
            }
        }
    };

    check_captcha(state.captcha.as_ref(), &req.captcha, &mut errors).await;

    let email = match email {
        Some(email) if errors.is_empty() => email,
        _ => return Err(errors.into_error()),
    };

    let done = Outcome::redirect("/password/reset/done/");

    let user = match state.users.find_user_by_email(&email).await? {
        Some(user) if user.is_active => user,
        Some(user) => {
            tracing::debug!(user_id = %user.id, "Password reset requested for inactive account");
            return Ok(done);
        }
        None => {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(done);
        }
    };

    let token = state.reset_tokens.make_token(&user);
    let link = state.site_link(&format!(
        "/password/reset/{}/{}/",
        encode_uid(user.id),
        token
    ));
    let message = password_reset_email(&user.email, &link)?;

    match state.mailer.send(message).await {
        Ok(()) => tracing::info!(user_id = %user.id, "Password reset email sent"),
        Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Password reset email not sent"),
    }

    Ok(done)
}

/// Shown after a reset request
pub async fn reset_done() -> Page {
    Page::new("Password Reset Request").message(
        "We've emailed you instructions for setting your password, if an account exists with the email you entered. You should receive them shortly.",
    )
}

/// Reports whether a reset link is usable and, if so, the fields to submit
pub async fn reset_confirm_page(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> ApiResult<Page> {
    let user =
        super::resolve_link_user(state.users.as_ref(), &state.reset_tokens, &uidb64, &token)
            .await?;

    let page = Page::new("Set New Password");
    Ok(match user {
        Some(_) => new_password_fields(page).valid_link(true),
        None => page.valid_link(false),
    })
}

/// Sets a new password from a reset link
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing, mismatched or weak new password
pub async fn reset_confirm(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    Json(req): Json<SetPasswordRequest>,
) -> ApiResult<Outcome> {
    let user =
        super::resolve_link_user(state.users.as_ref(), &state.reset_tokens, &uidb64, &token)
            .await?;

    let Some(user) = user else {
        return Ok(Outcome::redirect("/password/reset/")
            .error("invalid_reset_link", INVALID_RESET_LINK));
    };

    let errors = FieldErrors::from_validation(req.validate(), SET_FIELDS);
    let hash = new_password_hash(errors, &user, &req.new_password1, &req.new_password2).await?;

    state.users.set_password(user.id, &hash).await?;
    let revoked = state.sessions.delete_user_sessions(user.id, None).await?;

    tracing::info!(user_id = %user.id, revoked, "Password reset completed");

    Ok(Outcome::redirect("/password/reset/complete/"))
}

/// Shown after a successful reset
pub async fn reset_complete() -> Page {
    Page::new("Password Reset Complete")
        .message("Your password has been set. You may go ahead and log in now.")
}

/// Password change form descriptor
pub async fn change_page() -> Page {
    new_password_fields(
        Page::new("Change Password").field(FormField::new("old_password", "Old password", "password")),
    )
}

/// Changes the caller's password
///
/// The account's active flag is untouched; every session except the
/// caller's is revoked.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Wrong old password, mismatched or weak new
///   password
pub async fn change(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Outcome> {
    let mut errors = FieldErrors::from_validation(req.validate(), CHANGE_FIELDS);

    if !errors.has("old_password") {
        let matches = password::verify_password_async(
            req.old_password.clone(),
            auth.user.password_hash.clone(),
        )
        .await?;
        if !matches {
            tracing::warn!(user_id = %auth.user_id(), "Password change with wrong old password");
            errors.add("old_password", WRONG_OLD_PASSWORD);
        }
    }

    let hash = new_password_hash(errors, &auth.user, &req.new_password1, &req.new_password2).await?;

    state.users.set_password(auth.user_id(), &hash).await?;
    let revoked = state
        .sessions
        .delete_user_sessions(auth.user_id(), Some(auth.session_id))
        .await?;

    tracing::info!(user_id = %auth.user_id(), revoked, "Password changed");

    Ok(Outcome::redirect("/profile/").success("password_changed", PASSWORD_CHANGED))
}
