//! Unified error types for pageflow.
//!
//! Every variant renders with a stable, upper-case code prefix so log lines
//! and CLI output can be grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the pageflow runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty cache key).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A value could not be serialized for, or deserialized from, the session store.
    #[error("SERIALIZATION_FAILED: {0}")]
    Serialization(String),

    /// Store operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Signature derivation for a scheduled call failed.
    #[error("SIGNATURE_FAILED: {0}")]
    Signature(String),

    /// A scheduled handler returned an error.
    #[error("HANDLER_FAILED: {0}")]
    Handler(String),

    /// The scheduler was used outside of a tokio runtime.
    #[error("NO_RUNTIME: {0}")]
    NoRuntime(String),

    /// A keyword value the runtime does not know how to interpret.
    #[error("UNSUPPORTED_VALUE: {0}")]
    UnsupportedValue(String),

    /// The in-flight request was dropped before it produced a result.
    #[error("REQUEST_ABANDONED: {0}")]
    RequestAbandoned(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
}

impl Error {
    /// The code prefix of this error, without the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Serialization(_) => "SERIALIZATION_FAILED",
            Error::Database(_) | Error::MigrationFailed(_) => "STORE_ERROR",
            Error::Signature(_) => "SIGNATURE_FAILED",
            Error::Handler(_) => "HANDLER_FAILED",
            Error::NoRuntime(_) => "NO_RUNTIME",
            Error::UnsupportedValue(_) => "UNSUPPORTED_VALUE",
            Error::RequestAbandoned(_) => "REQUEST_ABANDONED",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::HttpError(_) => "HTTP_ERROR",
        }
    }
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RequestAbandoned("oembed:abc123".to_string());
        assert!(err.to_string().contains("REQUEST_ABANDONED"));
        assert!(err.to_string().contains("oembed:abc123"));
    }

    #[test]
    fn test_error_code_matches_display_prefix() {
        let err = Error::UnsupportedValue("visibility: obscured".to_string());
        assert!(err.to_string().starts_with(err.code()));

        let err = Error::MigrationFailed("bad version".to_string());
        assert_eq!(err.code(), "STORE_ERROR");
    }

    #[test]
    fn test_serde_json_error_is_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
