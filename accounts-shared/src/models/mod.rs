/// Account data model
///
/// # Models
///
/// - `email`: Normalized email address newtype
/// - `phone`: E.164 phone number parsing and national formatting
/// - `user`: User accounts and their SQL operations
/// - `session`: Login sessions backing issued access tokens

pub mod email;
pub mod phone;
pub mod session;
pub mod user;
