/// Session authentication middleware for Axum
///
/// Extracts the access token from `Authorization: Bearer <token>`, validates
/// it and resolves the session and user it names. On success an
/// [`AuthContext`] is added to the request extensions.
///
/// A token is honored only while:
///
/// - its signature, issuer and expiry verify
/// - the session row it names still exists and has not expired
/// - the session belongs to the token's subject
/// - the user exists and is active
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Extension, Router};
/// use accounts_shared::auth::middleware::{session_auth_middleware, AuthContext, SessionAuth};
/// use accounts_shared::store::MemoryStore;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.user.email)
/// }
///
/// let store = Arc::new(MemoryStore::new());
/// let auth = SessionAuth::new("your-secret-key-at-least-32-bytes", store.clone(), store);
///
/// let app: Router = Router::new()
///     .route("/profile/", get(handler))
///     .layer(middleware::from_fn_with_state(auth, session_auth_middleware));
/// ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::user::User;
use crate::store::{SessionStore, StoreError, UserStore};

/// Authenticated request context
///
/// Handlers extract it with `Extension<AuthContext>`. The user is loaded
/// fresh for every request, so profile data is never stale.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session_id: Uuid,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Authentication credentials were not provided")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Token, session or user no longer valid
    #[error("{0}")]
    InvalidToken(String),

    /// Authenticated but not allowed
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Storage error
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => {
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            AuthError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AuthError::DatabaseError(msg) => {
                tracing::error!(error = %msg, "Session lookup failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "internal_error",
                        "message": "An internal error occurred",
                    })),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(json!({
                "error": code,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// State carried by the session middleware
#[derive(Clone)]
pub struct SessionAuth {
    secret: Arc<str>,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
}

impl SessionAuth {
    pub fn new(
        secret: impl Into<Arc<str>>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            secret: secret.into(),
            users,
            sessions,
        }
    }

    /// Resolves an access token to its live session and user
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = validate_token(token, &self.secret).map_err(|e| match e {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
            _ => AuthError::InvalidToken("Invalid token".to_string()),
        })?;

        let session = self
            .sessions
            .find_session(claims.sid)
            .await?
            .filter(|s| s.user_id == claims.sub && !s.is_expired())
            .ok_or_else(|| AuthError::InvalidToken("Session has ended".to_string()))?;

        let user = self
            .users
            .find_user(session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AuthError::InvalidToken("Session has ended".to_string()))?;

        Ok(AuthContext {
            user,
            session_id: session.id,
        })
    }
}

/// Extracts the bearer token from the request headers
pub fn bearer_token(req: &Request) -> Result<&str, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Requires a live session
pub async fn session_auth_middleware(
    State(auth): State<SessionAuth>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req)?;

    let context = auth.authenticate(token).await.map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        e
    })?;

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Requires a staff account; must run after [`session_auth_middleware`]
pub async fn staff_only_middleware(req: Request, next: Next) -> Result<Response, AuthError> {
    let context = req
        .extensions()
        .get::<AuthContext>()
        .ok_or(AuthError::MissingCredentials)?;

    if !context.user.is_staff {
        tracing::warn!(user_id = %context.user.id, "Non-staff user denied admin access");
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(req).await)
}
