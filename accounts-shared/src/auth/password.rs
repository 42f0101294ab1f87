/// Password hashing and validation using Argon2id
///
/// # Security
///
/// - **Algorithm**: Argon2id (hybrid of Argon2i and Argon2d)
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// Hashing is CPU and memory heavy, so request handlers should use the
/// `*_async` variants which run on the blocking thread pool.
///
/// # Example
///
/// ```
/// use accounts_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("super_secret_password_123")?;
/// assert!(verify_password("super_secret_password_123", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use std::sync::OnceLock;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Passwords rejected outright, compared case-insensitively
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "passw0rd", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football", "baseball",
    "welcome1", "letmein1", "trustno1", "abc12345", "superman", "starwars", "whatever",
    "changeme", "admin123", "11111111", "00000000", "asdfghjkl", "dragon123", "monkey123",
];

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password using Argon2id with secure parameters
///
/// Returns a PHC string, e.g.
/// `$argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a hash
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored
/// hash cannot be parsed or verification itself fails.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters are embedded in the hash
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Hashes on the blocking thread pool
pub async fn hash_password_async(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::HashError(format!("Hashing task failed: {}", e)))?
}

/// Verifies on the blocking thread pool
pub async fn verify_password_async(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::VerifyError(format!("Verification task failed: {}", e)))?
}

/// Hash checked when no account matches a login
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("no account has this password").ok())
        .as_deref()
}

/// Spends the same work as [`verify_password_async`] and always fails
///
/// Called for unknown emails so a login for a missing account takes as long
/// as one with a wrong password.
pub async fn verify_dummy_password_async(password: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = dummy_hash() {
            let _ = verify_password(&password, hash);
        }
    })
    .await;
}

/// Describes a stored hash without revealing it
///
/// Used wherever an account's password field is displayed.
pub fn describe_hash(hash: &str) -> String {
    match PasswordHash::new(hash) {
        Ok(parsed) => format!("algorithm: {}", parsed.algorithm),
        Err(_) => "Invalid password format or unknown hashing algorithm.".to_string(),
    }
}

/// Validates a candidate password against the account it is for
///
/// Runs every check and returns all failures, in order:
/// - At least 8 characters
/// - Not too similar to the email's local part
/// - Not a commonly used password
/// - Not entirely numeric
///
/// # Example
///
/// ```
/// use accounts_shared::auth::password::validate_password;
///
/// assert!(validate_password("correct horse battery", "ada@example.com").is_ok());
///
/// let errors = validate_password("1234", "ada@example.com").unwrap_err();
/// assert_eq!(errors.len(), 2);
/// ```
pub fn validate_password(password: &str, email: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    if is_similar_to_email(password, email) {
        errors.push("The password is too similar to the email address.".to_string());
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        errors.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_similar_to_email(password: &str, email: &str) -> bool {
    let local = email.split('@').next().unwrap_or_default().to_lowercase();
    if local.chars().count() < 3 {
        return false;
    }

    let candidate = password.to_lowercase();
    candidate.contains(&local) || (candidate.chars().count() >= 3 && local.contains(&candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dummy_hash_matches_real_parameters() {
        let dummy = dummy_hash().unwrap();
        let real = hash_password("anything").unwrap();

        let params = |hash: &str| hash.split('$').take(4).collect::<Vec<_>>().join("$");
        assert_eq!(params(dummy), params(&real));
        assert!(!verify_password("anything", dummy).unwrap());

        verify_dummy_password_async("anything".to_string()).await;
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").expect("Hash 1 should succeed");
        let hash2 = hash_password("same_password").expect("Hash 2 should succeed");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_correct_and_incorrect() {
        let hash = hash_password("correct_password").expect("Hash should succeed");

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash").is_err());
        assert!(verify_password("password", "$argon2id$invalid").is_err());
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let hash = hash_password_async("unicode-密码-パスワード".to_string())
            .await
            .unwrap();
        assert!(verify_password_async("unicode-密码-パスワード".to_string(), hash)
            .await
            .unwrap());
    }

    #[test]
    fn test_describe_hash_hides_value() {
        let hash = hash_password("whatever-secret").unwrap();
        let described = describe_hash(&hash);
        assert_eq!(described, "algorithm: argon2id");
        assert!(!described.contains('$'));
        assert!(describe_hash("garbage").contains("Invalid"));
    }

    #[test]
    fn test_validate_password_accepts_reasonable_passwords() {
        for password in ["MyP@ssw0rd!", "correct horse battery", "Str0ng!Pass"] {
            assert!(validate_password(password, "ada@example.com").is_ok(), "{password}");
        }
    }

    #[test]
    fn test_validate_password_too_short() {
        let errors = validate_password("Sh0rt!", "ada@example.com").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at least 8 characters"));
    }

    #[test]
    fn test_validate_password_common() {
        let errors = validate_password("Password123", "ada@example.com").unwrap_err();
        assert_eq!(errors, vec!["This password is too common.".to_string()]);
    }

    #[test]
    fn test_validate_password_numeric() {
        let errors = validate_password("58302719", "ada@example.com").unwrap_err();
        assert_eq!(errors, vec!["This password is entirely numeric.".to_string()]);
    }

    #[test]
    fn test_validate_password_similar_to_email() {
        let errors = validate_password("lovelace2024", "lovelace@example.com").unwrap_err();
        assert!(errors[0].contains("too similar"));

        // Very short local parts are not checked
        assert!(validate_password("ab-cdefgh-ij", "ab@example.com").is_ok());
    }
}
