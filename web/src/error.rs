use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use storage::StorageError;

/// Errors raised while handling a request.
///
/// Handlers return these through `?`; the response they turn into carries an
/// [`UnhandledError`] marker so the exception handling middleware decides
/// what the client finally sees.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Response extension marking a response produced by a failure rather
/// than by a handler's normal output.
#[derive(Debug, Clone)]
pub struct UnhandledError {
    message: Arc<str>,
}

impl UnhandledError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::from(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::NotFound(what) = &self {
            log::debug!("Not found: {what}");
            return StatusCode::NOT_FOUND.into_response();
        }

        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(UnhandledError::new(self.to_string()));
        response
    }
}

/// Failures that abort startup before the first request is served.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to register Azure Storage clients: {0}")]
    StorageClients(#[source] StorageError),

    #[error("Failed to provision Azure Storage resources: {0}")]
    Provisioning(#[source] StorageError),

    #[error("Failed to parse view templates: {0}")]
    Views(#[source] tera::Error),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
