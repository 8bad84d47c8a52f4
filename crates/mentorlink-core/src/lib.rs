//! Core library for mentorlink.
//!
//! This crate owns the session lifecycle of the mentor app:
//! - `auth`: secure token storage, token inspection, and the session state machine
//! - `api`: the authenticated request pipeline and backend endpoint calls
//! - `models`: wire types for auth and mentee resources
//! - `config`: configuration file and environment overrides
//!
//! UI code talks to [`SessionController`] and nothing else.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;

#[cfg(test)]
pub(crate) mod testutil;

pub use api::{ApiClient, ApiError, RequestOptions};
pub use auth::{
    CredentialStore, Identity, KeyringStorage, MemoryStorage, SecureStorage, SessionController,
    SessionState, SessionStatus, StorageError,
};
pub use config::Config;
pub use error::{Error, Result};
pub use models::ValidationError;
