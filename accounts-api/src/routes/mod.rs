/// API route handlers
///
/// - `health`: Health check endpoint
/// - `signup`: Registration and email activation
/// - `session`: Login and logout
/// - `password`: Password reset by email and password change
/// - `profile`: View, update and delete the signed-in account
/// - `admin`: Staff-only user listing

pub mod admin;
pub mod health;
pub mod password;
pub mod profile;
pub mod session;
pub mod signup;

use accounts_shared::{
    auth::tokens::{decode_uid, TokenGenerator},
    models::user::User,
    store::UserStore,
};

use crate::error::ApiResult;

/// Resolves an emailed `uidb64`/`token` pair to its account
///
/// Returns `None` for every kind of bad link without saying which; the
/// reason is logged at debug level.
pub(crate) async fn resolve_link_user(
    users: &dyn UserStore,
    tokens: &TokenGenerator,
    uidb64: &str,
    token: &str,
) -> ApiResult<Option<User>> {
    let purpose = tokens.purpose();

    let user_id = match decode_uid(uidb64) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(?purpose, error = %e, "Link rejected: undecodable uid");
            return Ok(None);
        }
    };

    let Some(user) = users.find_user(user_id).await? else {
        tracing::debug!(?purpose, %user_id, "Link rejected: unknown user");
        return Ok(None);
    };

    if !tokens.check_token(&user, token) {
        tracing::debug!(?purpose, %user_id, "Link rejected: invalid, expired or used token");
        return Ok(None);
    }

    Ok(Some(user))
}
