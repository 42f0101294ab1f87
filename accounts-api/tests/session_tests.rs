/// Integration tests for login, logout and session authentication

mod common;

use accounts_api::routes::session::INVALID_LOGIN;
use accounts_shared::auth::jwt::validate_token;
use axum::http::StatusCode;
use common::{error_fields, field_messages, TestContext, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let (status, body) = ctx.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_login_form_descriptor() {
    let ctx = TestContext::new();

    let (status, body) = ctx.get("/login/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Login");
    assert_eq!(body["fields"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_login_returns_session_token() {
    let ctx = TestContext::new();
    let user = ctx.create_active_user("alice@example.com", false).await;

    let (status, body) = ctx.login_with("alice@example.com", PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["redirect"], "/profile/");
    assert!(body["expires_at"].is_string());

    let claims = validate_token(
        body["access_token"].as_str().unwrap(),
        "integration-test-secret-key-32-bytes!",
    )
    .unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(ctx.store.session_count(user.id).await, 1);

    let user = ctx.user("alice@example.com").await.unwrap();
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn test_bad_credentials_share_one_error() {
    let ctx = TestContext::new();
    ctx.create_active_user("alice@example.com", false).await;
    ctx.signup("inactive@example.com").await;

    for (email, password) in [
        ("alice@example.com", "wrong password here"),
        ("nobody@example.com", PASSWORD),
        ("inactive@example.com", PASSWORD),
        ("not an email", PASSWORD),
    ] {
        let (status, body) = ctx.login_with(email, password).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", email);
        assert_eq!(field_messages(&body, "__all__"), vec![INVALID_LOGIN], "{}", email);
    }
}

#[tokio::test]
async fn test_login_requires_captcha() {
    let ctx = TestContext::new();
    ctx.create_active_user("alice@example.com", false).await;

    let (status, body) = ctx
        .post(
            "/login/",
            None,
            json!({ "email": "alice@example.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_fields(&body), vec!["captcha"]);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let ctx = TestContext::new();

    for uri in ["/profile/", "/profile/update/", "/password/change/", "/logout/", "/admin/users/"] {
        let (status, _) = ctx.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let (status, _) = ctx.get("/profile/", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_only_current_session() {
    let ctx = TestContext::new();
    ctx.create_active_user("alice@example.com", false).await;
    let first = ctx.login("alice@example.com").await;
    let second = ctx.login("alice@example.com").await;

    let (status, body) = ctx.get("/logout/", Some(&first)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Logout");

    let (status, body) = ctx.post("/logout/", Some(&first), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], "/login/");
    assert_eq!(body["notices"][0]["level"], "info");
    assert_eq!(body["notices"][0]["message"], "You have been logged out.");

    let (status, _) = ctx.get("/profile/", Some(&first)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.get("/profile/", Some(&second)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let ctx = TestContext::new();

    let response = tower::ServiceExt::oneshot(
        ctx.app.clone(),
        axum::http::Request::builder()
            .uri("/login/")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}
