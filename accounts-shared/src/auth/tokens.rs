/// Signed, time-limited link tokens for activation and password reset
///
/// A link carries two path segments: the user id encoded as URL-safe base64
/// (`uidb64`) and a token of the form `<timestamp>-<signature>`.
///
/// - `timestamp` is the issue time in seconds since 2001-01-01 UTC, base36.
/// - `signature` is HMAC-SHA256 over the user id, a fingerprint of mutable
///   account state and the timestamp, truncated to 20 bytes and hex encoded.
///
/// The fingerprint is what makes a token single-use: activation tokens cover
/// the `is_active` flag, reset tokens cover the password hash, so consuming
/// the token changes the state it was signed over and it stops verifying.
/// Both cover the last-login stamp.
///
/// # Example
///
/// ```
/// use accounts_shared::auth::tokens::{decode_uid, encode_uid, TokenGenerator, TokenPurpose};
/// # use accounts_shared::models::{email::Email, phone::PhoneNumber, user::{NewUser, User}};
///
/// # let user = User::from_new(NewUser::inactive(
/// #     Email::parse("a@x.com").unwrap(),
/// #     PhoneNumber::parse("+14155550123", 1).unwrap(),
/// #     "hash".to_string(),
/// # ));
/// let tokens = TokenGenerator::new(TokenPurpose::Activation, "secret", 3 * 24 * 3600);
///
/// let uid = encode_uid(user.id);
/// let token = tokens.make_token(&user);
///
/// assert_eq!(decode_uid(&uid).unwrap(), user.id);
/// assert!(tokens.check_token(&user, &token));
/// ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::user::User;

/// Bytes of the HMAC kept in the token
const SIGNATURE_LENGTH: usize = 20;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z
const TOKEN_EPOCH_OFFSET: i64 = 978_307_200;

/// Longest base36 timestamp accepted (covers dates far beyond any deployment)
const MAX_TIMESTAMP_CHARS: usize = 13;

/// Error type for link decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The uid segment is not valid base64
    #[error("Invalid uid encoding")]
    InvalidEncoding,

    /// The decoded uid is not a UUID
    #[error("Invalid uid value")]
    InvalidUid,
}

/// What a token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Flip an inactive account active
    Activation,

    /// Set a new password without knowing the old one
    PasswordReset,
}

impl TokenPurpose {
    /// Key salt; tokens for one purpose never verify for the other
    fn key_salt(&self) -> &'static str {
        match self {
            TokenPurpose::Activation => "accounts.tokens.AccountActivationTokenGenerator",
            TokenPurpose::PasswordReset => "accounts.tokens.PasswordResetTokenGenerator",
        }
    }

    /// Mutable account state the token is bound to
    fn fingerprint(&self, user: &User) -> String {
        let login_stamp = user
            .last_login
            .map(|t| t.timestamp().to_string())
            .unwrap_or_default();

        match self {
            TokenPurpose::Activation => format!("{}{}", user.is_active, login_stamp),
            TokenPurpose::PasswordReset => {
                format!("{}{}{}", user.password_hash, login_stamp, user.email)
            }
        }
    }
}

/// Issues and checks link tokens for one purpose
#[derive(Clone)]
pub struct TokenGenerator {
    purpose: TokenPurpose,
    key: [u8; 32],
    timeout_seconds: i64,
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("purpose", &self.purpose)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenGenerator {
    /// Creates a generator
    ///
    /// # Arguments
    ///
    /// * `purpose` - Activation or password reset
    /// * `secret` - Application secret; the signing key is derived from it and the purpose
    /// * `timeout_seconds` - How long an issued token stays valid
    pub fn new(purpose: TokenPurpose, secret: &str, timeout_seconds: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(purpose.key_salt().as_bytes());
        hasher.update(secret.as_bytes());

        Self {
            purpose,
            key: hasher.finalize().into(),
            timeout_seconds,
        }
    }

    pub fn purpose(&self) -> TokenPurpose {
        self.purpose
    }

    /// Issues a token for the user's current state
    pub fn make_token(&self, user: &User) -> String {
        self.make_token_at(user, Utc::now())
    }

    /// Issues a token as if at `now`
    pub fn make_token_at(&self, user: &User, now: DateTime<Utc>) -> String {
        let timestamp = (now.timestamp() - TOKEN_EPOCH_OFFSET).max(0);
        self.token_with_timestamp(user, timestamp)
    }

    /// Checks a token against the user's current state
    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, Utc::now())
    }

    /// Checks a token as if at `now`
    ///
    /// Fails when the token is malformed, was signed for different user
    /// state, is older than the timeout, or claims to be issued in the future.
    pub fn check_token_at(&self, user: &User, token: &str, now: DateTime<Utc>) -> bool {
        let Some((ts_b36, signature_hex)) = token.split_once('-') else {
            return false;
        };

        let Some(timestamp) = base36_decode(ts_b36) else {
            return false;
        };

        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        if signature.len() != SIGNATURE_LENGTH {
            return false;
        }

        // Constant-time comparison of the truncated MAC
        let expected = self.mac(user, timestamp).finalize().into_bytes();
        if !constant_time_eq(&expected[..SIGNATURE_LENGTH], &signature) {
            return false;
        }

        let age = now.timestamp() - TOKEN_EPOCH_OFFSET - timestamp;
        (0..=self.timeout_seconds).contains(&age)
    }

    fn token_with_timestamp(&self, user: &User, timestamp: i64) -> String {
        let digest = self.mac(user, timestamp).finalize().into_bytes();
        format!(
            "{}-{}",
            base36_encode(timestamp),
            hex::encode(&digest[..SIGNATURE_LENGTH])
        )
    }

    fn mac(&self, user: &User, timestamp: i64) -> Hmac<Sha256> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(user.id.as_bytes());
        mac.update(self.purpose.fingerprint(user).as_bytes());
        mac.update(timestamp.to_string().as_bytes());
        mac
    }
}

/// Encodes a user id for use in a URL path segment
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Decodes a `uidb64` path segment back into a user id
pub fn decode_uid(uidb64: &str) -> Result<Uuid, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(uidb64.trim_end_matches('='))
        .map_err(|_| TokenError::InvalidEncoding)?;
    let text = String::from_utf8(bytes).map_err(|_| TokenError::InvalidUid)?;
    Uuid::parse_str(&text).map_err(|_| TokenError::InvalidUid)
}

fn base36_encode(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn base36_decode(text: &str) -> Option<i64> {
    if text.is_empty() || text.len() > MAX_TIMESTAMP_CHARS {
        return None;
    }
    i64::from_str_radix(text, 36).ok().filter(|v| *v >= 0)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{email::Email, phone::PhoneNumber, user::NewUser};
    use chrono::Duration;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
    const DAY: i64 = 24 * 3600;

    fn user(email: &str) -> User {
        User::from_new(NewUser::inactive(
            Email::parse(email).unwrap(),
            PhoneNumber::parse("+14155550123", 1).unwrap(),
            "$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA".to_string(),
        ))
    }

    fn activation() -> TokenGenerator {
        TokenGenerator::new(TokenPurpose::Activation, SECRET, 3 * DAY)
    }

    #[test]
    fn test_token_format() {
        let token = activation().make_token(&user("a@x.com"));
        let (ts, sig) = token.split_once('-').unwrap();
        assert!(ts.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(sig.len(), SIGNATURE_LENGTH * 2);
    }

    #[test]
    fn test_valid_token_checks() {
        let u = user("a@x.com");
        let token = activation().make_token(&u);
        assert!(activation().check_token(&u, &token));
    }

    #[test]
    fn test_token_for_other_user_fails() {
        let a = user("a@x.com");
        let b = user("b@x.com");
        let token = activation().make_token(&a);
        assert!(!activation().check_token(&b, &token));
    }

    #[test]
    fn test_activation_token_is_single_use() {
        let mut u = user("a@x.com");
        let token = activation().make_token(&u);

        u.is_active = true;
        assert!(!activation().check_token(&u, &token));
    }

    #[test]
    fn test_reset_token_invalidated_by_password_change_and_login() {
        let reset = TokenGenerator::new(TokenPurpose::PasswordReset, SECRET, 3 * DAY);
        let mut u = user("a@x.com");
        u.is_active = true;

        let token = reset.make_token(&u);
        assert!(reset.check_token(&u, &token));

        let mut changed = u.clone();
        changed.password_hash = "$argon2id$different".to_string();
        assert!(!reset.check_token(&changed, &token));

        let mut logged_in = u.clone();
        logged_in.last_login = Some(Utc::now());
        assert!(!reset.check_token(&logged_in, &token));
    }

    #[test]
    fn test_purposes_do_not_cross_verify() {
        let u = user("a@x.com");
        let reset = TokenGenerator::new(TokenPurpose::PasswordReset, SECRET, 3 * DAY);
        assert!(!reset.check_token(&u, &activation().make_token(&u)));
    }

    #[test]
    fn test_different_secret_fails() {
        let u = user("a@x.com");
        let other = TokenGenerator::new(TokenPurpose::Activation, "another-secret-entirely-32-bytes!", 3 * DAY);
        assert!(!other.check_token(&u, &activation().make_token(&u)));
    }

    #[test]
    fn test_expiry_window() {
        let u = user("a@x.com");
        let issued = Utc::now() - Duration::days(10);
        let token = activation().make_token_at(&u, issued);

        assert!(activation().check_token_at(&u, &token, issued + Duration::days(3)));
        assert!(!activation().check_token_at(&u, &token, issued + Duration::days(3) + Duration::seconds(1)));
        assert!(!activation().check_token(&u, &token));
    }

    #[test]
    fn test_future_token_rejected() {
        let u = user("a@x.com");
        let token = activation().make_token_at(&u, Utc::now() + Duration::hours(1));
        assert!(!activation().check_token(&u, &token));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let u = user("a@x.com");
        let good = activation().make_token(&u);
        let (ts, sig) = good.split_once('-').unwrap();

        for bad in [
            String::new(),
            "no-dash-here-but-many".to_string(),
            ts.to_string(),
            format!("{ts}-{}", &sig[..10]),
            format!("{ts}-{}", "zz".repeat(SIGNATURE_LENGTH)),
            format!("!!-{sig}"),
            format!("{}-{sig}", "z".repeat(20)),
        ] {
            assert!(!activation().check_token(&u, &bad), "{bad:?} should fail");
        }
    }

    #[test]
    fn test_uid_roundtrip_and_errors() {
        let id = Uuid::new_v4();
        let encoded = encode_uid(id);
        assert!(!encoded.contains('='));
        assert_eq!(decode_uid(&encoded), Ok(id));

        assert_eq!(decode_uid("%%%"), Err(TokenError::InvalidEncoding));
        assert_eq!(
            decode_uid(&URL_SAFE_NO_PAD.encode("42")),
            Err(TokenError::InvalidUid)
        );
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36_encode(0), "0");
        assert_eq!(base36_encode(35), "z");
        assert_eq!(base36_encode(36), "10");
        assert_eq!(base36_decode("10"), Some(36));
        assert_eq!(base36_decode(""), None);
        assert_eq!(base36_decode("-1"), None);
    }
}
