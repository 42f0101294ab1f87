/// Email address newtype
///
/// Addresses are trimmed and lowercased on parse so that uniqueness checks and
/// lookups are case-insensitive regardless of the storage backend. Syntax is
/// checked with `validator`'s email rule, and the domain must have a dot.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidateEmail;

/// A syntactically valid, normalized email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

/// Error returned when an address cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Enter a valid email address.")]
pub struct InvalidEmail;

impl Email {
    /// Parses and normalizes an email address
    ///
    /// # Example
    ///
    /// ```
    /// use accounts_shared::models::email::Email;
    ///
    /// let email = Email::parse(" Alice@Example.COM ").unwrap();
    /// assert_eq!(email.as_ref(), "alice@example.com");
    /// assert!(Email::parse("not-an-email").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, InvalidEmail> {
        let normalized = raw.trim().to_lowercase();

        let (local, domain) = normalized.split_once('@').ok_or(InvalidEmail)?;

        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || normalized.len() > 254
            || normalized.chars().any(char::is_whitespace)
            || !normalized.validate_email()
        {
            return Err(InvalidEmail);
        }

        Ok(Self(normalized))
    }

    /// The part before the `@`
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
