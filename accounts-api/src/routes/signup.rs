/// Registration and activation endpoints
///
/// - `GET /signup/` - Signup form descriptor
/// - `POST /signup/` - Create an inactive account and email an activation link
/// - `GET /activate/:uidb64/:token/` - Consume the activation link

use accounts_shared::{
    auth::{password, tokens::encode_uid},
    mail::templates::activation_email,
    models::{email::Email, phone::PhoneNumber, user::NewUser},
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiResult, DUPLICATE_EMAIL},
    forms::{check_captcha, check_new_password, FieldErrors, FormField, Page},
    notice::Outcome,
};

pub const ACTIVATION_SENT: &str = "An activation email has been sent to your email address";
pub const ACTIVATION_SEND_FAILED: &str = "An error occurred while sending the activation email make sure you entered a valid email address";
pub const ACCOUNT_ACTIVATED: &str = "Your account has been activated. You can login now.";
pub const INVALID_ACTIVATION_LINK: &str = "Invalid activation link please try again";

const FIELDS: &[&str] = &["email", "phone", "password1", "password2", "captcha"];

/// Signup request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignupRequest {
    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub email: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub phone: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub password1: String,

    #[validate(length(min = 1, code = "required", message = "This field is required."))]
    pub password2: String,

    pub captcha: String,
}

/// Signup form descriptor
pub async fn signup_page(State(state): State<AppState>) -> Page {
    Page::new("Sign Up")
        .field(FormField::new("email", "e-mail", "email"))
        .field(FormField::new("phone", "Phone Number", "tel"))
        .field(FormField::new("password1", "Password", "password"))
        .field(FormField::new("password2", "Password confirmation", "password"))
        .with_captcha(state.captcha.as_ref())
}

/// Registers a new account
///
/// Every field problem is reported together. On success the account exists
/// inactive and an activation email has been attempted; a failed send is an
/// error notice, not an error response.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Any field failed validation, including an
///   already registered email
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Outcome> {
    let mut errors = FieldErrors::from_validation(req.validate(), FIELDS);

    let email = if errors.has("email") {
        None
    } else {
        match Email::parse(&req.email) {
            Ok(email) => {
                if state.users.email_exists(&email).await? {
                    errors.add("email", DUPLICATE_EMAIL);
                }
                Some(email)
            }
            Err(e) => {
                errors.add("email", e.to_string());
                None
            }
        }
    };

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

    let similar_to: &str = match &email {
        Some(email) => email.as_ref(),
        None => &req.email,
    };
    check_new_password(
        &mut errors,
        &req.password1,
        &req.password2,
        "password2",
        similar_to,
    );

    check_captcha(state.captcha.as_ref(), &req.captcha, &mut errors).await;

    let (email, phone) = match (email, phone) {
        (Some(email), Some(phone)) if errors.is_empty() => (email, phone),
        _ => return Err(errors.into_error()),
    };

    let password_hash = password::hash_password_async(req.password1).await?;

    // A concurrent signup can still win the race; the store reports it as
    // the same email error.
    let user = state
        .users
        .create_user(NewUser::inactive(email, phone, password_hash))
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let token = state.activation_tokens.make_token(&user);
    let link = state.site_link(&format!("/activate/{}/{}/", encode_uid(user.id), token));
    let message = activation_email(&user.email, &link, state.config.security.token_timeout_seconds)?;

    let outcome = Outcome::redirect("/login/");
    Ok(match state.mailer.send(message).await {
        Ok(()) => outcome.success("activation_sent", ACTIVATION_SENT),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Activation email not sent");
            outcome.error("activation_send_failed", ACTIVATION_SEND_FAILED)
        }
    })
}

/// Activates the account named by an emailed link
///
/// Every failure reads the same to the caller. The token is bound to the
/// account's active flag, so a consumed link never verifies again.
pub async fn activate(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> ApiResult<Outcome> {
    let outcome = Outcome::redirect("/login/");

    let user = super::resolve_link_user(
        state.users.as_ref(),
        &state.activation_tokens,
        &uidb64,
        &token,
    )
    .await?;

    let Some(user) = user else {
        return Ok(outcome.error("invalid_activation_link", INVALID_ACTIVATION_LINK));
    };

    if !state.users.activate_user(user.id).await? {
        tracing::debug!(user_id = %user.id, "Activation lost a race with another request");
        return Ok(outcome.error("invalid_activation_link", INVALID_ACTIVATION_LINK));
    }

    tracing::info!(user_id = %user.id, "Account activated");
    Ok(outcome.success("account_activated", ACCOUNT_ACTIVATED))
}
