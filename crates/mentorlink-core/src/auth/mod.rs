//! Authentication module for managing the mentor's session.
//!
//! This module provides:
//! - `SecureStorage`: the persistence seam, backed by the OS keychain
//! - `CredentialStore`: cached access/refresh token pair over that storage
//! - `token`: offline inspection of access token expiry and identity claims
//! - `SessionController`: the observable session state machine
//!
//! Tokens are decoded but never verified client-side. Claims read here are
//! display hints; the backend decides what a token may do.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod token;

pub use credentials::CredentialStore;
pub use session::{SessionController, SessionState, SessionStatus};
pub use storage::{KeyringStorage, MemoryStorage, SecureStorage, StorageError};
pub use token::Identity;
