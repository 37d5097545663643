//! Error taxonomy shared by the auth session and the playback controller
//!
//! Authentication errors end the session, playback errors degrade to local
//! state, validation errors reject the call before anything happens.

use thiserror::Error;

use crate::model::{ApiError, StorageError};

/// Failures of the login flow or of a call that needs a valid token
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization rejected by provider: {error}")]
    ProviderRejected { error: String },

    #[error("state returned by provider does not match the pending login")]
    CsrfMismatch,

    #[error("callback carried no authorization code")]
    MissingCode,

    #[error("token exchange failed: {detail}")]
    ExchangeFailed { detail: String },

    #[error("no valid access token, login required")]
    Unauthenticated,

    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Transport failures that could not be recovered locally
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no playback device available")]
    NoDevice,

    #[error("action forbidden, check account plan or permissions")]
    Forbidden,

    #[error("requested item not found")]
    NotFound,

    #[error("provider request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// True when the caller has to send the user back through login
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Auth(AuthError::Unauthenticated))
    }
}

impl From<ApiError> for PlaybackError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Forbidden => PlaybackError::Forbidden,
            ApiError::NotFound => PlaybackError::NotFound,
            other => PlaybackError::Transport(other.to_string()),
        }
    }
}

impl From<StorageError> for Error {
    fn from(error: StorageError) -> Self {
        Error::Auth(AuthError::Storage(error))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
