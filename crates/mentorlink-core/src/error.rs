//! Error taxonomy for the session core.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::StorageError;
use crate::models::ValidationError;

/// Message shown when the session can no longer be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

#[derive(Error, Debug)]
pub enum Error {
    /// Persisting a credential failed. Reads and deletes never surface this.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Refresh failed, or the backend rejected a freshly refreshed token.
    /// Local credentials are already cleared when this is returned.
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Rejected before any network call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Api(ApiError::Network(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
