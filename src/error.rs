//! Error types for taskmaster
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid task input, bad config)
//! - 3: Referenced task does not exist
//! - 4: Operation failed (storage, serialization, locking)

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// Exit codes for the taskmaster CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskmaster operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid task: {0}")]
    Validation(ValidationReport),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Missing references (exit code 3)
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Operation failures (exit code 4)
    #[error("No data directory available; pass --data-dir or set TASKMASTER_DIR")]
    DataDirUnavailable,

    #[error("Failed to read stored tasks: {0}")]
    PersistenceRead(String),

    #[error("Failed to write stored tasks: {0}")]
    PersistenceWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) | Error::InvalidConfig(_) | Error::InvalidArgument(_) => {
                exit_codes::USER_ERROR
            }

            Error::TaskNotFound(_) => exit_codes::NOT_FOUND,

            Error::DataDirUnavailable
            | Error::PersistenceRead(_)
            | Error::PersistenceWrite(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured payload for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation(report) => Some(serde_json::json!({
                "errors": report.errors(),
            })),
            Error::TaskNotFound(id) => Some(serde_json::json!({ "id": id })),
            Error::InvalidConfig(message) => Some(serde_json::json!({ "message": message })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskmaster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
