//! # Accounts API Server Library
//!
//! This library provides the core functionality for the accounts API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `bootstrap`: Startup tasks
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `forms`: Form descriptors and field validation helpers
//! - `middleware`: Security headers
//! - `notice`: Redirect outcomes with user-facing notices
//! - `routes`: API route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod notice;
pub mod routes;
