//! Unified error types for stash.
//!
//! Variants group into the fetch, storage and manifest families; the
//! display prefix doubles as a stable code for tool callers.

use std::path::PathBuf;

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error types for the stash cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network failure or non-success HTTP status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Disk read/write failure under the cache root.
    #[error("STORAGE_ERROR: {context} ({}): {source}", .path.display())]
    Storage {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be encoded or decoded.
    #[error("MANIFEST_ERROR: {0}")]
    Manifest(String),

    /// No cache entry for the given URL.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),
}

impl Error {
    /// Build a storage error for an I/O failure at `path`.
    pub fn storage(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage { context, path: path.into(), source }
    }

    /// Whether this error belongs to the fetch family.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::HttpError(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::Storage { .. } => (-32020, err.to_string()),
            Error::Manifest(msg) => (-32021, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("https://example.com/".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("https://example.com/"));
    }

    #[test]
    fn test_storage_error_display() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::storage("write document", "/tmp/stash/abc/index.html", io);
        let msg = err.to_string();
        assert!(msg.starts_with("STORAGE_ERROR: write document"));
        assert!(msg.contains("index.html"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_fetch_family() {
        assert!(Error::HttpError("status 404".into()).is_fetch());
        assert!(Error::FetchTimeout("30s".into()).is_fetch());
        assert!(!Error::Manifest("bad".into()).is_fetch());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("https://example.com/".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);

        let io = std::io::Error::other("disk full");
        let mcp_err: McpError = Error::storage("write", "/x", io).into();
        assert_eq!(mcp_err.code.0, -32020);
        assert!(mcp_err.message.contains("disk full"));
    }
}
