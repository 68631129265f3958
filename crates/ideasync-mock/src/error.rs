use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures in the shapes the real backend uses: the auth API answers with
/// `error`/`error_description`, the table API with `message`/`code`.
#[derive(Error, Debug)]
pub enum MockError {
    #[error("{description}")]
    Auth {
        status: StatusCode,
        error: &'static str,
        description: String,
    },

    #[error("{message}")]
    Rest {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl MockError {
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::Auth {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_grant",
            description: description.into(),
        }
    }

    pub fn unauthorized(description: impl Into<String>) -> Self {
        Self::Auth {
            status: StatusCode::UNAUTHORIZED,
            error: "unauthorized",
            description: description.into(),
        }
    }

    pub fn unprocessable(description: impl Into<String>) -> Self {
        Self::Auth {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error: "validation_failed",
            description: description.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self::Rest {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "PGRST000",
            message: "Service temporarily unavailable".to_string(),
        }
    }

    pub fn policy(table: &str) -> Self {
        Self::Rest {
            status: StatusCode::FORBIDDEN,
            code: "42501",
            message: format!("new row violates row-level security policy for table \"{}\"", table),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Rest {
            status: StatusCode::BAD_REQUEST,
            code: "PGRST100",
            message: message.into(),
        }
    }

    pub fn unknown_table(table: &str) -> Self {
        Self::Rest {
            status: StatusCode::NOT_FOUND,
            code: "42P01",
            message: format!("relation \"public.{}\" does not exist", table),
        }
    }

    pub fn duplicate(constraint: &str) -> Self {
        Self::Rest {
            status: StatusCode::CONFLICT,
            code: "23505",
            message: format!("duplicate key value violates unique constraint \"{}\"", constraint),
        }
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth {
                status,
                error,
                description,
            } => (
                status,
                Json(json!({ "error": error, "error_description": description })),
            )
                .into_response(),
            Self::Rest { status, code, message } => {
                (status, Json(json!({ "code": code, "message": message }))).into_response()
            }
        }
    }
}
