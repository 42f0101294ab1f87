/// Transactional mail API client

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::{EmailMessage, MailError, Mailer};

/// Deadline for one send request
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
}

/// Sends mail by POSTing JSON to an HTTP API with a bearer token
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    from: String,
    timeout: Duration,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_token: api_token.into(),
            from: from.into(),
            timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let request = SendRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html_body: &message.html_body,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, to = %message.to, "Mail API rejected message");
            return Err(MailError::Send(format!(
                "mail API returned {}: {}",
                status, body
            )));
        }

        debug!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_shape() {
        let request = SendRequest {
            from: "no-reply@example.com",
            to: "a@x.com",
            subject: "Hello",
            html_body: "<p>Hi</p>",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["from"], "no-reply@example.com");
        assert_eq!(json["to"], "a@x.com");
        assert_eq!(json["html_body"], "<p>Hi</p>");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_send_error() {
        let mailer = HttpMailer::new("http://127.0.0.1:9/send", "token", "no-reply@example.com");
        let result = mailer
            .send(EmailMessage {
                to: "a@x.com".to_string(),
                subject: "Hello".to_string(),
                html_body: "<p>Hi</p>".to_string(),
            })
            .await;

        assert!(matches!(result, Err(MailError::Send(_))));
    }

    #[tokio::test]
    async fn test_stalled_api_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold connections without ever answering
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mailer = HttpMailer::new(format!("http://{}/send", addr), "token", "no-reply@example.com")
            .with_timeout(Duration::from_millis(200));
        let send = mailer.send(EmailMessage {
            to: "a@x.com".to_string(),
            subject: "Hello".to_string(),
            html_body: "<p>Hi</p>".to_string(),
        });

        let result = tokio::time::timeout(Duration::from_secs(5), send)
            .await
            .expect("send gives up on its own");
        assert!(matches!(result, Err(MailError::Send(_))));
    }
}
