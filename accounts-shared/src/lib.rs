//! # Accounts Shared Library
//!
//! This crate contains the domain types, security primitives and storage
//! layer used by the accounts API server.
//!
//! ## Module Organization
//!
//! - `models`: Account, session, email and phone types plus their SQL
//! - `auth`: Password hashing, signed link tokens, session JWTs, request authentication
//! - `store`: Storage traits with PostgreSQL and in-memory implementations
//! - `mail`: Outbound email rendering and delivery
//! - `captcha`: Human-verification collaborators
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod captcha;
pub mod db;
pub mod mail;
pub mod models;
pub mod store;

/// Current version of the accounts shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
