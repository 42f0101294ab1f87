//! # Accounts API Server
//!
//! User accounts over JSON: signup with email activation, login sessions,
//! password reset and change, profile management and a staff-only listing.
//!
//! ## Usage
//!
//! ```bash
//! SECRET_KEY=$(openssl rand -hex 32) cargo run -p accounts-api
//! ```
//!
//! Without `DATABASE_URL` the server runs on an in-memory store; without
//! mail or reCAPTCHA settings it logs emails and accepts any CAPTCHA.

use std::{sync::Arc, time::Duration};

use accounts_api::{
    app::{build_router, AppState},
    bootstrap::ensure_admin,
    config::Config,
};
use accounts_shared::{
    captcha::{CaptchaVerifier, RecaptchaVerifier, StaticCaptcha},
    db::{
        migrations::run_migrations,
        pool::{self, create_pool},
    },
    mail::{HttpMailer, LogMailer, Mailer},
    store::{MemoryStore, PgStore, SessionStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are purged
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_FORMAT=json switches to one JSON object per line
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accounts_api=debug,accounts_shared=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!(
        "Accounts API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let mailer: Arc<dyn Mailer> = match (&config.mail.api_url, &config.mail.api_token) {
        (Some(url), Some(token)) => {
            tracing::info!(url = %url, "Sending mail through HTTP API");
            Arc::new(HttpMailer::new(url, token, &config.mail.from))
        }
        _ => {
            tracing::warn!("MAIL_API_URL/MAIL_API_TOKEN not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let captcha: Arc<dyn CaptchaVerifier> =
        match (&config.captcha.secret_key, &config.captcha.site_key) {
            (Some(secret), Some(site)) => Arc::new(RecaptchaVerifier::new(secret, site)),
            _ => {
                tracing::warn!(
                    "RECAPTCHA_SECRET_KEY/RECAPTCHA_SITE_KEY not set, CAPTCHA checks accept any response"
                );
                Arc::new(StaticCaptcha::accepting())
            }
        };

    let state = match &config.database {
        Some(database) => {
            let pool = create_pool(pool::DatabaseConfig::new(
                &database.url,
                database.max_connections,
            ))
            .await?;
            run_migrations(&pool).await?;
            AppState::with_store(config.clone(), Arc::new(PgStore::new(pool)), mailer, captcha)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            AppState::with_store(config.clone(), Arc::new(MemoryStore::new()), mailer, captcha)
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        ensure_admin(
            state.users.as_ref(),
            admin,
            config.site.default_calling_code,
        )
        .await?;
    }

    let purger = tokio::spawn(purge_sessions(state.sessions.clone()));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purger.abort();
    tracing::info!("Server stopped");

    Ok(())
}

/// Deletes expired sessions on a fixed interval
async fn purge_sessions(sessions: Arc<dyn SessionStore>) {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);

    loop {
        interval.tick().await;
        match sessions.purge_expired_sessions().await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
            Err(e) => tracing::warn!(error = %e, "Session purge failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
