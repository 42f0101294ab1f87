/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use accounts_api::{app::{build_router, AppState}, config::Config};
/// use accounts_shared::{captcha::StaticCaptcha, mail::LogMailer, store::MemoryStore};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::with_store(
///     config,
///     Arc::new(MemoryStore::new()),
///     Arc::new(LogMailer),
///     Arc::new(StaticCaptcha::accepting()),
/// );
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use accounts_shared::{
    auth::{
        middleware::{session_auth_middleware, staff_only_middleware, SessionAuth},
        tokens::{TokenGenerator, TokenPurpose},
    },
    captcha::CaptchaVerifier,
    mail::{templates::absolute_link, Mailer},
    store::{SessionStore, UserStore},
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler via Axum's `State` extractor; every field is
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,

    pub sessions: Arc<dyn SessionStore>,

    pub mailer: Arc<dyn Mailer>,

    pub captcha: Arc<dyn CaptchaVerifier>,

    /// Signs activation links
    pub activation_tokens: Arc<TokenGenerator>,

    /// Signs password reset links
    pub reset_tokens: Arc<TokenGenerator>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        mailer: Arc<dyn Mailer>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> Self {
        let secret = &config.security.secret_key;
        let timeout = config.security.token_timeout_seconds;

        Self {
            users,
            sessions,
            mailer,
            captcha,
            activation_tokens: Arc::new(TokenGenerator::new(
                TokenPurpose::Activation,
                secret,
                timeout,
            )),
            reset_tokens: Arc::new(TokenGenerator::new(
                TokenPurpose::PasswordReset,
                secret,
                timeout,
            )),
            config: Arc::new(config),
        }
    }

    /// State backed by one store serving both users and sessions
    pub fn with_store<S>(
        config: Config,
        store: Arc<S>,
        mailer: Arc<dyn Mailer>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> Self
    where
        S: UserStore + SessionStore + 'static,
    {
        Self::new(config, store.clone(), store, mailer, captcha)
    }

    /// Gets the secret for signing access tokens
    pub fn jwt_secret(&self) -> &str {
        &self.config.security.secret_key
    }

    /// State for the session authentication layer
    pub fn session_auth(&self) -> SessionAuth {
        SessionAuth::new(
            self.jwt_secret(),
            self.users.clone(),
            self.sessions.clone(),
        )
    }

    /// Absolute URL for a site path, as used in emailed links
    pub fn site_link(&self, path: &str) -> String {
        absolute_link(&self.config.site.base_url, path)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                  # Health check (public)
/// ├── /signup/                    GET POST     # Registration (public)
/// ├── /activate/:uidb64/:token/   GET          # Activation link (public)
/// ├── /login/                     GET POST     # (public)
/// ├── /logout/                    GET POST     # (session)
/// ├── /password/
/// │   ├── reset/                  GET POST     # Request reset email (public)
/// │   ├── reset/done/             GET          # (public)
/// │   ├── reset/:uidb64/:token/   GET POST     # Set new password (public)
/// │   ├── reset/complete/         GET          # (public)
/// │   └── change/                 GET POST     # (session)
/// ├── /profile/                   GET          # (session)
/// │   ├── update/                 GET POST     # (session)
/// │   └── delete/                 GET POST     # (session)
/// └── /admin/users/               GET          # (session + staff)
///     └── :id/                    GET          # (session + staff)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Session authentication, then staff check (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/signup/",
            get(routes::signup::signup_page).post(routes::signup::signup),
        )
        .route("/activate/:uidb64/:token/", get(routes::signup::activate))
        .route(
            "/login/",
            get(routes::session::login_page).post(routes::session::login),
        )
        .route(
            "/password/reset/",
            get(routes::password::reset_page).post(routes::password::reset),
        )
        .route("/password/reset/done/", get(routes::password::reset_done))
        .route(
            "/password/reset/:uidb64/:token/",
            get(routes::password::reset_confirm_page).post(routes::password::reset_confirm),
        )
        .route(
            "/password/reset/complete/",
            get(routes::password::reset_complete),
        );

    let session_routes = Router::new()
        .route(
            "/logout/",
            get(routes::session::logout_page).post(routes::session::logout),
        )
        .route(
            "/password/change/",
            get(routes::password::change_page).post(routes::password::change),
        )
        .route("/profile/", get(routes::profile::view))
        .route(
            "/profile/update/",
            get(routes::profile::update_page).post(routes::profile::update),
        )
        .route(
            "/profile/delete/",
            get(routes::profile::delete_page).post(routes::profile::delete),
        )
        .layer(middleware::from_fn_with_state(
            state.session_auth(),
            session_auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users/", get(routes::admin::list_users))
        .route("/users/:id/", get(routes::admin::user_detail))
        .layer(middleware::from_fn(staff_only_middleware))
        .layer(middleware::from_fn_with_state(
            state.session_auth(),
            session_auth_middleware,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .nest("/admin", admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
