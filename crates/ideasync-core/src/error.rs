use thiserror::Error;

use ideasync_backend::BackendError;
use ideasync_types::models::Role;

use crate::validation::ValidationError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Please sign in to continue")]
    NotSignedIn,

    #[error("This page is for {0}s only")]
    WrongRole(Role),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Local storage error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    /// Text fit for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            // Backend messages already read as sentences
            Self::Backend(BackendError::Api { message, .. }) => message.clone(),
            Self::Backend(BackendError::Http(_)) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Store(_) => "Something went wrong saving data on this device.".to_string(),
            other => other.to_string(),
        }
    }

    /// Authorization failures redirect rather than report.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::NotSignedIn | Self::WrongRole(_) | Self::Forbidden(_))
    }
}
