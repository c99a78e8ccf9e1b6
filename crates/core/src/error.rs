//! Unified error types for the offline worker.
//!
//! The display strings carry a stable SCREAMING_CASE code so the host page
//! (and logs) can match on them without parsing prose.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for nimbus.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., unknown HTTP method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The network could not produce a response at all.
    ///
    /// An HTTP error status is still a response; this covers connect,
    /// timeout, body read and size-cap failures.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// Storing a response in a partition failed.
    #[error("CACHE_WRITE_FAILED: {0}")]
    CacheWriteFailure(String),

    /// No entry found for the request.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Pre-caching the static manifest failed; the install attempt is discarded.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailure(String),

    /// A lifecycle transition was requested from the wrong state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// A control message with an unknown or malformed type.
    #[error("UNRECOGNIZED_MESSAGE: {0}")]
    UnrecognizedMessage(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::NetworkFailure(msg) => (-32020, msg.clone()),
            Error::CacheWriteFailure(msg) => (-32021, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::InstallFailure(msg) => (-32022, msg.clone()),
            Error::InvalidState(msg) => (-32023, msg.clone()),
            Error::UnrecognizedMessage(msg) => (-32024, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
