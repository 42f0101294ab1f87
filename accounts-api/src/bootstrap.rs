//! Startup tasks run before the server accepts requests

use accounts_shared::{
    auth::password::{hash_password_async, validate_password},
    models::{email::Email, phone::PhoneNumber, user::NewUser},
    store::{StoreError, UserStore},
};
use anyhow::Context;

use crate::config::AdminBootstrap;

/// Ensures the configured superuser exists
///
/// Returns `true` if the account was created. An existing account with the
/// same email is left untouched, whatever its flags.
///
/// # Errors
///
/// Returns an error if the email, phone or password is unacceptable, or
/// storage fails.
pub async fn ensure_admin(
    users: &dyn UserStore,
    admin: &AdminBootstrap,
    default_calling_code: u16,
) -> anyhow::Result<bool> {
    let email = Email::parse(&admin.email).context("BOOTSTRAP_ADMIN_EMAIL")?;

    if users.email_exists(&email).await? {
        tracing::debug!(email = %email.as_ref(), "Bootstrap admin already exists");
        return Ok(false);
    }

    let phone = PhoneNumber::parse(&admin.phone, default_calling_code)
        .context("BOOTSTRAP_ADMIN_PHONE")?;

    if let Err(problems) = validate_password(&admin.password, email.as_ref()) {
        anyhow::bail!("BOOTSTRAP_ADMIN_PASSWORD rejected: {}", problems.join(" "));
    }

    let hash = hash_password_async(admin.password.clone()).await?;

    match users.create_user(NewUser::superuser(email, phone, hash)).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
            Ok(true)
        }
        // Another instance created it first
        Err(StoreError::DuplicateEmail) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
