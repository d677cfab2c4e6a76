//! Error types for the request client.
//!
//! # Design
//! Every failure a call can produce is a distinct variant so callers branch
//! on `ErrorKind` instead of matching message text. The `Display` output of
//! `Application` and `HttpStatus` is exactly the server-provided text, which
//! is also what gets shown to the user through the `Notifier`.

use std::time::Duration;

use thiserror::Error;

use crate::envelope::ResponseCode;

/// Body text used when a failed response body cannot be read.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Errors returned by `RequestClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be built (bad query mapping, bad config value).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The call did not settle within its timeout.
    #[error("Request timed out for {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The HTTP request could not be formed (unparsable URL, invalid header).
    #[error("Invalid request for {url}: {message}")]
    Request { url: String, message: String },

    /// The transport failed before any response was received.
    #[error("Request error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A non-2xx response after retries were exhausted.
    #[error("{body}")]
    HttpStatus { status: u16, body: String },

    /// The envelope carried a code other than `success`.
    #[error("{message}")]
    Application { code: ResponseCode, message: String },

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body was not a valid envelope for the expected payload.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Fieldless discriminant of `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Timeout,
    Request,
    Transport,
    HttpStatus,
    Application,
    Serialization,
    Deserialization,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidInput(_) => ErrorKind::InvalidInput,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Request { .. } => ErrorKind::Request,
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::HttpStatus { .. } => ErrorKind::HttpStatus,
            ApiError::Application { .. } => ErrorKind::Application,
            ApiError::Serialization(_) => ErrorKind::Serialization,
            ApiError::Deserialization(_) => ErrorKind::Deserialization,
        }
    }

    /// Build an `HttpStatus` error from a response body, substituting a
    /// status-bearing message when the body is empty.
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = if body.is_empty() {
            format!("request failed with status {status}")
        } else {
            body.to_string()
        };
        ApiError::HttpStatus { status, body }
    }

    /// Whether this failure is surfaced to the user. Errors raised while
    /// building the request are returned without notification.
    pub fn is_reported(&self) -> bool {
        !matches!(self, ApiError::InvalidInput(_) | ApiError::Serialization(_))
    }
}
