//! Common test utilities for integration tests
//!
//! Every test drives the full router in-process:
//! - In-memory store, inspectable directly
//! - Recording mailer, so emailed links can be followed
//! - Static CAPTCHA verifier
//! - Request helpers returning status and JSON body

#![allow(dead_code)]

use std::sync::Arc;

use accounts_api::{
    app::{build_router, AppState},
    config::Config,
};
use accounts_shared::{
    auth::password::hash_password,
    captcha::{CaptchaVerifier, StaticCaptcha},
    mail::RecordingMailer,
    models::{
        email::Email,
        phone::PhoneNumber,
        user::{NewUser, User},
    },
    store::{MemoryStore, UserStore},
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const BASE_URL: &str = "http://testserver";
pub const PASSWORD: &str = "correct horse battery";
pub const NEW_PASSWORD: &str = "purple monkey dishwasher";
pub const PHONE: &str = "+14155550123";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestContext {
    /// Creates a context whose CAPTCHA accepts any non-empty response
    pub fn new() -> Self {
        Self::with_captcha(StaticCaptcha::accepting())
    }

    pub fn with_captcha(captcha: impl CaptchaVerifier + 'static) -> Self {
        let config = Config::from_lookup(|key| match key {
            "SECRET_KEY" => Some("integration-test-secret-key-32-bytes!".to_string()),
            "SITE_BASE_URL" => Some(BASE_URL.to_string()),
            _ => None,
        })
        .expect("test configuration is valid");

        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());

        let state = AppState::with_store(config, store.clone(), mailer.clone(), Arc::new(captcha));

        Self {
            app: build_router(state),
            store,
            mailer,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn signup(&self, email: &str) -> (StatusCode, Value) {
        self.post(
            "/signup/",
            None,
            json!({
                "email": email,
                "phone": PHONE,
                "password1": PASSWORD,
                "password2": PASSWORD,
                "captcha": "ok",
            }),
        )
        .await
    }

    /// Path of the link in the most recent email to `to`
    pub fn emailed_path(&self, to: &str) -> String {
        let message = self
            .mailer
            .sent_to(to)
            .pop()
            .unwrap_or_else(|| panic!("no email sent to {}", to));

        let start = message.html_body.find("href=\"").expect("email has a link") + 6;
        let link = &message.html_body[start..];
        let link = &link[..link.find('"').expect("link is terminated")];

        link.strip_prefix(BASE_URL)
            .expect("link uses the site base URL")
            .to_string()
    }

    /// Signs up and activates through the emailed link
    pub async fn signup_active(&self, email: &str) {
        let (status, _) = self.signup(email).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self.get(&self.emailed_path(email), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notices"][0]["code"], "account_activated");
    }

    pub async fn login_with(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/login/",
            None,
            json!({ "email": email, "password": password, "captcha": "ok" }),
        )
        .await
    }

    /// Logs in and returns the access token
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self.login_with(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Inserts an active account directly into the store
    pub async fn create_active_user(&self, email: &str, staff: bool) -> User {
        let email = Email::parse(email).unwrap();
        let phone = PhoneNumber::parse(PHONE, 1).unwrap();
        let hash = hash_password(PASSWORD).unwrap();

        let data = if staff {
            NewUser::superuser(email, phone, hash)
        } else {
            NewUser {
                is_active: true,
                ..NewUser::inactive(email, phone, hash)
            }
        };

        self.store.create_user(data).await.unwrap()
    }

    pub async fn user(&self, email: &str) -> Option<User> {
        self.store
            .find_user_by_email(&Email::parse(email).unwrap())
            .await
            .unwrap()
    }
}

/// Field names of a validation error body, in order
pub fn error_fields(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .filter_map(|d| d["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Messages reported for one field
pub fn field_messages(body: &Value, field: &str) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .filter(|d| d["field"] == field)
                .filter_map(|d| d["message"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
