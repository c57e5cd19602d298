#![deny(warnings)]

// Error types for the univer-fileserver crate

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{error, warn};

/// Errors raised while handling a request against the file server.
///
/// Every variant maps onto an HTTP status via [`FileServerError::status_code`]
/// and renders as a JSON object with at least an `error` field.
#[derive(Error, Debug)]
pub enum FileServerError {
    /// Mutating request resolved outside the writable root
    #[error("Writes are only allowed inside the {data_dir}/ directory.")]
    OutsideWritableRoot { data_dir: String, requested: String },

    /// Requested file does not exist
    #[error("File not found")]
    NotFound(String),

    /// Request body larger than the configured limit
    #[error("Request body exceeds the limit of {0} bytes")]
    PayloadTooLarge(usize),

    /// Request body could not be read from the connection
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    /// HTTP method outside the supported verb set
    #[error("Unsupported method ({0})")]
    UnsupportedMethod(String),

    /// Filesystem operation failed on a specific path
    #[error("Failed to {operation} {path}: {source}")]
    Filesystem {
        operation: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO errors outside a request path (bind, accept)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking filesystem task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors raised by the process supervisor and its health probe
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Server binary could not be started
    #[error("Failed to spawn server process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Health request failed (connection refused, timeout, bad body)
    #[error("Health probe failed: {0}")]
    Probe(#[from] reqwest::Error),

    /// Health endpoint answered with a non-200 status
    #[error("Health endpoint returned HTTP {0}")]
    Unhealthy(u16),

    /// Health endpoint answered 200 but did not report `ok: true`
    #[error("Health endpoint did not report ok")]
    NotOk,

    /// Child exited while we were waiting for it to come up
    #[error("Server process exited before becoming healthy ({0})")]
    Exited(std::process::ExitStatus),

    /// Retry budget exhausted
    #[error("Server did not become healthy after {0} attempts")]
    Timeout(u32),

    /// Termination signal could not be delivered
    #[error("Failed to signal server process: {0}")]
    Signal(String),

    /// IO errors while waiting on or killing the child
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FileServerError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested: Option<String>,
}

impl FileServerError {
    /// Wrap an io::Error raised while performing `operation` on `path`
    pub fn filesystem(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        FileServerError::Filesystem {
            operation,
            path: path.display().to_string(),
            source,
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            FileServerError::OutsideWritableRoot { .. } => StatusCode::FORBIDDEN,
            FileServerError::NotFound(_) => StatusCode::NOT_FOUND,
            FileServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            FileServerError::RequestBody(_) => StatusCode::BAD_REQUEST,
            FileServerError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            FileServerError::Filesystem { .. }
            | FileServerError::Io(_)
            | FileServerError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn requested(&self) -> Option<String> {
        match self {
            FileServerError::OutsideWritableRoot { requested, .. }
            | FileServerError::NotFound(requested) => Some(requested.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", self);
        } else if status == StatusCode::FORBIDDEN {
            warn!(requested = ?self.requested(), "Rejected write outside writable root");
        }

        let body = ErrorBody {
            error: self.to_string(),
            requested: self.requested(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_status_codes() {
        let forbidden = FileServerError::OutsideWritableRoot {
            data_dir: "data".to_string(),
            requested: "../x".to_string(),
        };
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            FileServerError::NotFound("data/a".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            FileServerError::UnsupportedMethod("PATCH".to_string()).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        let io = FileServerError::filesystem(
            "remove",
            Path::new("/tmp/x"),
            std::io::Error::from(ErrorKind::PermissionDenied),
        );
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_boundary_message_names_data_dir() {
        let err = FileServerError::OutsideWritableRoot {
            data_dir: "data".to_string(),
            requested: "outside.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Writes are only allowed inside the data/ directory."
        );
        assert_eq!(err.requested().as_deref(), Some("outside.json"));
    }

    #[test]
    fn test_filesystem_error_includes_path_and_cause() {
        let err = FileServerError::filesystem(
            "write",
            Path::new("/srv/data/a.json"),
            std::io::Error::other("disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/srv/data/a.json"));
        assert!(msg.contains("disk full"));
    }
}
