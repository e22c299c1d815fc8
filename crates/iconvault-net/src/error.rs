//! Error types for the networking crate.

use std::fmt;

/// Network-specific errors.
#[derive(Debug, Clone)]
pub enum NetworkError {
    /// HTTP request failed.
    Request(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Request timed out.
    Timeout,
    /// Connection refused or failed.
    Connection(String),
    /// HTTP error status (4xx or 5xx).
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },
    /// Response body exceeded the configured size limit.
    BodyTooLarge {
        /// The limit that was exceeded, in bytes.
        limit: u64,
    },
    /// Response was not an image.
    NotAnImage {
        /// The content type the server reported, if any.
        content_type: Option<String>,
    },
    /// Redirect limit exceeded.
    TooManyRedirects,
    /// No icon could be found at any candidate location.
    NoIcon(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "HTTP request error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::HttpStatus { status } => write!(f, "HTTP {status}"),
            Self::BodyTooLarge { limit } => write!(f, "Response body exceeds {limit} bytes"),
            Self::NotAnImage { content_type } => match content_type {
                Some(ct) => write!(f, "Response is not an image ({ct})"),
                None => write!(f, "Response is not an image"),
            },
            Self::TooManyRedirects => write!(f, "Too many redirects"),
            Self::NoIcon(target) => write!(f, "No icon found for {target}"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
