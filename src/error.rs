use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// The index or record data is structurally invalid.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// The stream ended part-way through a record or a node run.
    #[error("truncated data: {0}")]
    Truncated(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    fn error_type(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidRange(_) => "InvalidRange",
            Error::Corrupt(_) | Error::Truncated(_) => "CorruptData",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::Corrupt(_) | Error::Truncated(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = ErrorResponse {
            error: ErrorBody {
                error: self.error_type(),
                message: self.to_string(),
            },
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
