/// Human-verification collaborators
///
/// Signup, login and password-reset forms carry a CAPTCHA response that must
/// verify before anything else happens. Verification goes through the
/// [`CaptchaVerifier`] trait so tests and local development can swap the
/// reCAPTCHA client for [`StaticCaptcha`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// reCAPTCHA verification endpoint
pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Deadline for one verification round trip
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for CAPTCHA verification
#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    /// Verification service unreachable or returned garbage
    #[error("CAPTCHA verification request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for CaptchaError {
    fn from(err: reqwest::Error) -> Self {
        CaptchaError::Transport(err.to_string())
    }
}

/// Verifies CAPTCHA responses submitted with a form
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns whether the response token is valid
    async fn verify(&self, response: &str) -> Result<bool, CaptchaError>;

    /// Public key embedded in form descriptors for the client widget
    fn site_key(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Google reCAPTCHA v2 (invisible) verifier
#[derive(Clone)]
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    timeout: Duration,
    secret_key: String,
    site_key: String,
}

impl RecaptchaVerifier {
    pub fn new(secret_key: impl Into<String>, site_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            verify_url: RECAPTCHA_VERIFY_URL.to_string(),
            timeout: VERIFY_TIMEOUT,
            secret_key: secret_key.into(),
            site_key: site_key.into(),
        }
    }

    /// Overrides the verification endpoint
    pub fn with_verify_url(mut self, url: impl Into<String>) -> Self {
        self.verify_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, response: &str) -> Result<bool, CaptchaError> {
        if response.is_empty() {
            return Ok(false);
        }

        let reply: SiteVerifyResponse = self
            .client
            .post(&self.verify_url)
            .timeout(self.timeout)
            .form(&[("secret", self.secret_key.as_str()), ("response", response)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !reply.success {
            debug!(error_codes = ?reply.error_codes, "reCAPTCHA rejected response");
        }

        Ok(reply.success)
    }

    fn site_key(&self) -> &str {
        &self.site_key
    }
}

/// Verifier with a fixed answer
///
/// Accepts any non-empty response when `accept` is true. Used in tests and
/// when no reCAPTCHA keys are configured.
#[derive(Debug, Clone)]
pub struct StaticCaptcha {
    accept: bool,
}

impl StaticCaptcha {
    pub fn accepting() -> Self {
        Self { accept: true }
    }

    pub fn rejecting() -> Self {
        Self { accept: false }
    }
}

#[async_trait]
impl CaptchaVerifier for StaticCaptcha {
    async fn verify(&self, response: &str) -> Result<bool, CaptchaError> {
        if !self.accept {
            warn!("Static CAPTCHA verifier configured to reject");
        }
        Ok(self.accept && !response.is_empty())
    }

    fn site_key(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_accepting() {
        let captcha = StaticCaptcha::accepting();
        assert!(captcha.verify("anything").await.unwrap());
        assert!(!captcha.verify("").await.unwrap());
    }

    #[tokio::test]
    async fn test_static_rejecting() {
        let captcha = StaticCaptcha::rejecting();
        assert!(!captcha.verify("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_recaptcha_empty_response_short_circuits() {
        // Never reaches the network
        let captcha = RecaptchaVerifier::new("secret", "site")
            .with_verify_url("http://127.0.0.1:9/unreachable");
        assert!(!captcha.verify("").await.unwrap());
        assert_eq!(captcha.site_key(), "site");
    }

    #[tokio::test]
    async fn test_recaptcha_transport_error() {
        let captcha = RecaptchaVerifier::new("secret", "site")
            .with_verify_url("http://127.0.0.1:9/unreachable");
        assert!(matches!(
            captcha.verify("token").await,
            Err(CaptchaError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_recaptcha_stalled_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let captcha = RecaptchaVerifier::new("secret", "site")
            .with_verify_url(format!("http://{}/siteverify", addr))
            .with_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), captcha.verify("token"))
            .await
            .expect("verification gives up on its own");
        assert!(matches!(result, Err(CaptchaError::Transport(_))));
    }

    #[test]
    fn test_site_verify_response_parsing() {
        let reply: SiteVerifyResponse =
            serde_json::from_str(r#"{"success": false, "error-codes": ["invalid-input-response"]}"#)
                .unwrap();
        assert!(!reply.success);
        assert_eq!(reply.error_codes, vec!["invalid-input-response"]);

        let reply: SiteVerifyResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(reply.success);
        assert!(reply.error_codes.is_empty());
    }
}
