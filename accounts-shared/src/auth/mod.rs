/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength validation
/// - [`jwt`]: Session access tokens (HS256)
/// - [`tokens`]: Signed, time-bounded activation and password-reset links
/// - [`middleware`]: Axum layers resolving access tokens to live sessions
///
/// # Example
///
/// ```no_run
/// use accounts_shared::auth::password::{hash_password, verify_password};
/// use accounts_shared::auth::tokens::{TokenGenerator, TokenPurpose};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery staple")?;
/// assert!(verify_password("correct horse battery staple", &hash)?);
///
/// let activation = TokenGenerator::new(
///     TokenPurpose::Activation,
///     "your-secret-key-at-least-32-bytes",
///     259_200,
/// );
/// # let _ = activation;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;
