use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::PathBuf;

use crate::forbidden::forbidden_response;

/// Errors raised while loading settings, configuration or logging
#[derive(Debug, thiserror::Error)]
pub enum CodeCastError {
    #[error("Failed to read config file '{}': {}", .path.display(), .source)]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{}': {}", .path.display(), .source)]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },

    #[error("Logging setup failed: {0}")]
    LoggingError(String),
}

/// A terminal failure of one default-pipeline step
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not determine working copy branch: {0}")]
    BranchCheck(String),

    #[error(
        "branch mismatch, server may be misconfigured (expected '{expected}', working copy is on '{actual}')"
    )]
    BranchMismatch { expected: String, actual: String },

    #[error("error pulling from remote: {0}")]
    Pull(String),

    #[error("error installing deps: {0}")]
    InstallDeps(String),

    #[error("error building application: {0}")]
    Build(String),

    #[error("error moving files: {0}")]
    MoveFiles(String),
}

/// Everything a webhook request can end in besides success.
///
/// The response mapping is deliberately coarse: the sender only ever sees a
/// status code, diagnostics stay in the server log.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("forbidden")]
    Forbidden,

    #[error("too many requests")]
    RateLimited,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("strategy '{0}' is not implemented")]
    NotImplemented(String),

    #[error(transparent)]
    Config(#[from] CodeCastError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::Forbidden => forbidden_response(),
            WebhookError::RateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response()
            }
            WebhookError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request").into_response(),
            WebhookError::NotImplemented(_) => {
                (StatusCode::NOT_IMPLEMENTED, "Not Implemented").into_response()
            }
            WebhookError::Config(_) | WebhookError::Pipeline(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Helper type for Results that use CodeCastError
pub type Result<T> = std::result::Result<T, CodeCastError>;
