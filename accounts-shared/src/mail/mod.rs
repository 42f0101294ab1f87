/// Outbound email
///
/// Account emails are rendered from askama templates (`templates/`) into an
/// [`EmailMessage`] and handed to a [`Mailer`]. Each request sends at most
/// one message and awaits it; there is no queue or retry.
///
/// # Implementations
///
/// - [`HttpMailer`]: JSON POST to a transactional mail API
/// - [`LogMailer`]: writes messages to the log, for development
/// - [`RecordingMailer`]: keeps messages in memory, for tests

use async_trait::async_trait;
use serde::Serialize;

pub mod http;
pub mod recording;
pub mod templates;

pub use http::HttpMailer;
pub use recording::RecordingMailer;

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Template rendering failed
    #[error("Failed to render email: {0}")]
    Render(String),

    /// Mail API unreachable or rejected the message
    #[error("Failed to send email: {0}")]
    Send(String),
}

impl From<askama::Error> for MailError {
    fn from(err: askama::Error) -> Self {
        MailError::Render(err.to_string())
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        MailError::Send(err.to_string())
    }
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Delivers rendered messages
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Mailer that only logs
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.html_body,
            "Email not delivered (no mail API configured)"
        );
        Ok(())
    }
}
