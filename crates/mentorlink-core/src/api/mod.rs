//! REST API client module for the mentorlink backend.
//!
//! This module provides the `ApiClient`, the single path through which
//! every backend call passes. Protected calls carry a bearer access token
//! and renew it transparently through the refresh endpoint.

pub mod client;
pub mod error;

pub use client::{ApiClient, RequestOptions, SessionExpiredHook};
pub use error::ApiError;
