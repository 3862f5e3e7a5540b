use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or missing form fields
    #[error("{message}")]
    InvalidInput { message: String },

    /// Wrong verb on the upload endpoint
    #[error("Shake out your pockets")]
    MethodNotAllowed,

    /// Upload to object storage failed
    #[error("File upload to R2 failed")]
    Storage {
        #[source]
        source: anyhow::Error,
    },

    /// Request to the inference backend failed before streaming started
    #[error("Error communicating with backend: {message}")]
    Backend { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details before the response is written. The Display
        // impl doubles as the user-facing body; storage causes stay out of it.
        match &self {
            Error::Storage { source } => {
                tracing::error!("Object storage upload failed: {:#}", source);
            }
            Error::Backend { message } => {
                tracing::error!("Inference backend request failed: {}", message);
            }
            Error::InvalidInput { .. } | Error::MethodNotAllowed => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.to_string()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
