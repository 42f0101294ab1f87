/// Middleware modules for the API server
///
/// Session and staff checks live in `accounts_shared::auth::middleware`.

pub mod security;
