/// Configuration management for the API server
///
/// Configuration is read from environment variables, with `.env` loaded
/// first in development.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:8080)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for any (default: `*`)
/// - `DATABASE_URL`: PostgreSQL connection string; absent means in-memory storage
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `SECRET_KEY`: Signs access tokens and email links (required, 32+ chars)
/// - `SESSION_TTL_HOURS`: Login session lifetime (default: 336)
/// - `TOKEN_TIMEOUT_SECONDS`: Activation/reset link validity (default: 259200)
/// - `SITE_BASE_URL`: Prefix for links in emails (default: http://localhost:8080)
/// - `DEFAULT_CALLING_CODE`: Country code for numbers without `+` (default: 1)
/// - `MAIL_API_URL` / `MAIL_API_TOKEN` / `MAIL_FROM`: Mail API; absent means log-only
/// - `RECAPTCHA_SECRET_KEY` / `RECAPTCHA_SITE_KEY`: reCAPTCHA; absent means always-pass
/// - `BOOTSTRAP_ADMIN_EMAIL` / `BOOTSTRAP_ADMIN_PASSWORD` / `BOOTSTRAP_ADMIN_PHONE`:
///   Superuser ensured at startup
///
/// # Example
///
/// ```no_run
/// use accounts_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use anyhow::Context;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,

    /// `None` runs on the in-memory store
    pub database: Option<DatabaseConfig>,

    pub security: SecurityConfig,

    pub site: SiteConfig,

    pub mail: MailConfig,

    pub captcha: CaptchaConfig,

    pub bootstrap_admin: Option<AdminBootstrap>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode turns on HSTS
    pub production: bool,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Signing secrets and lifetimes
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Signs access tokens and activation/reset links
    ///
    /// Must be at least 32 characters. Generate with `openssl rand -hex 32`.
    pub secret_key: String,

    pub session_ttl_hours: i64,

    pub token_timeout_seconds: i64,
}

/// Public site settings
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Scheme and host that emailed links point at
    pub base_url: String,

    /// Calling code assumed for phone numbers entered without `+`
    pub default_calling_code: u16,
}

/// Outbound mail settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub from: String,
}

/// reCAPTCHA keys
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub secret_key: Option<String>,
    pub site_key: Option<String>,
}

/// Superuser created at startup if missing
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub phone: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if `SECRET_KEY` is missing or short, or any value
    /// fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret_key = lookup("SECRET_KEY")
            .ok_or_else(|| anyhow::anyhow!("SECRET_KEY environment variable is required"))?;

        if secret_key.len() < 32 {
            anyhow::bail!("SECRET_KEY must be at least 32 characters long");
        }

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database = match lookup("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_EMAIL"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
            lookup("BOOTSTRAP_ADMIN_PHONE"),
        ) {
            (Some(email), Some(password), Some(phone)) => Some(AdminBootstrap {
                email,
                password,
                phone,
            }),
            (None, None, None) => None,
            _ => anyhow::bail!(
                "BOOTSTRAP_ADMIN_EMAIL, BOOTSTRAP_ADMIN_PASSWORD and BOOTSTRAP_ADMIN_PHONE must be set together"
            ),
        };

        let session_ttl_hours: i64 = parse_or(&lookup, "SESSION_TTL_HOURS", 336)?;
        let token_timeout_seconds: i64 = parse_or(&lookup, "TOKEN_TIMEOUT_SECONDS", 259_200)?;
        if session_ttl_hours <= 0 || token_timeout_seconds <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS and TOKEN_TIMEOUT_SECONDS must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 8080)?,
                production: parse_or(&lookup, "API_PRODUCTION", false)?,
                cors_origins,
            },
            database,
            security: SecurityConfig {
                secret_key,
                session_ttl_hours,
                token_timeout_seconds,
            },
            site: SiteConfig {
                base_url: lookup("SITE_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:8080".to_string()),
                default_calling_code: parse_or(&lookup, "DEFAULT_CALLING_CODE", 1)?,
            },
            mail: MailConfig {
                api_url: lookup("MAIL_API_URL"),
                api_token: lookup("MAIL_API_TOKEN"),
                from: lookup("MAIL_FROM").unwrap_or_else(|| "no-reply@localhost".to_string()),
            },
            captcha: CaptchaConfig {
                secret_key: lookup("RECAPTCHA_SECRET_KEY"),
                site_key: lookup("RECAPTCHA_SITE_KEY"),
            },
            bootstrap_admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.security.session_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("SECRET_KEY", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.api.production);
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(config.database.is_none());
        assert_eq!(config.security.session_ttl_hours, 336);
        assert_eq!(config.security.token_timeout_seconds, 259_200);
        assert_eq!(config.site.base_url, "http://localhost:8080");
        assert_eq!(config.site.default_calling_code, 1);
        assert!(config.mail.api_url.is_none());
        assert_eq!(config.mail.from, "no-reply@localhost");
        assert!(config.captcha.secret_key.is_none());
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_secret_required_and_long() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("SECRET_KEY", "short")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SECRET_KEY", SECRET),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("API_PRODUCTION", "true"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("DATABASE_URL", "postgresql://localhost/accounts"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("DEFAULT_CALLING_CODE", "44"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(config.api.production);
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgresql://localhost/accounts");
        assert_eq!(database.max_connections, 4);
        assert_eq!(config.site.default_calling_code, 44);
    }

    #[test]
    fn test_invalid_number_rejected() {
        assert!(config_from(&[("SECRET_KEY", SECRET), ("API_PORT", "eighty")]).is_err());
        assert!(config_from(&[("SECRET_KEY", SECRET), ("SESSION_TTL_HOURS", "0")]).is_err());
    }

    #[test]
    fn test_bootstrap_admin_needs_all_parts() {
        assert!(config_from(&[
            ("SECRET_KEY", SECRET),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@example.com"),
        ])
        .is_err());

        assert!(config_from(&[
            ("SECRET_KEY", SECRET),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "a long admin password"),
        ])
        .is_err());

        let config = config_from(&[
            ("SECRET_KEY", SECRET),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "a long admin password"),
            ("BOOTSTRAP_ADMIN_PHONE", "+14155550123"),
        ])
        .unwrap();
        assert_eq!(config.bootstrap_admin.unwrap().email, "admin@example.com");
    }
}
