use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Could not reach the server: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unexpected {table} data from server: {reason}")]
    MalformedRow { table: &'static str, reason: String },

    #[error("You must be signed in to do that")]
    NotAuthenticated,
}

impl BackendError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The backend refused the request itself (bad credentials, duplicate
    /// email, revoked token), as opposed to a transport failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }
}
