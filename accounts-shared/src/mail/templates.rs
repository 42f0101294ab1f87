/// Account email templates
///
/// Links are built from the configured site URL and encoded tokens only, so
/// templates emit them unescaped. Addresses are escaped.

use askama::Template;

use super::{EmailMessage, MailError};

pub const ACTIVATION_SUBJECT: &str = "Activate your account";
pub const PASSWORD_RESET_SUBJECT: &str = "Password reset";

#[derive(Template)]
#[template(path = "activation_email.html")]
struct ActivationEmail<'a> {
    email: &'a str,
    link: &'a str,
    valid_days: i64,
}

#[derive(Template)]
#[template(path = "password_reset_email.html")]
struct PasswordResetEmail<'a> {
    email: &'a str,
    link: &'a str,
}

/// Joins the site base URL and a path without doubling the slash
pub fn absolute_link(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builds the activation email for `to`
pub fn activation_email(
    to: &str,
    link: &str,
    timeout_seconds: i64,
) -> Result<EmailMessage, MailError> {
    let html_body = ActivationEmail {
        email: to,
        link,
        valid_days: (timeout_seconds / 86_400).max(1),
    }
    .render()?;

    Ok(EmailMessage {
        to: to.to_string(),
        subject: ACTIVATION_SUBJECT.to_string(),
        html_body,
    })
}

/// Builds the password reset email for `to`
pub fn password_reset_email(to: &str, link: &str) -> Result<EmailMessage, MailError> {
    let html_body = PasswordResetEmail { email: to, link }.render()?;

    Ok(EmailMessage {
        to: to.to_string(),
        subject: PASSWORD_RESET_SUBJECT.to_string(),
        html_body,
    })
}
