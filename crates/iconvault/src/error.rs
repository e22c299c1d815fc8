//! Error types for the icon pipeline.

use iconvault_net::NetworkError;
use iconvault_render::RenderError;
use thiserror::Error;

/// Errors surfaced by the pipeline to its callers.
///
/// Every variant maps to a stable code via [`IconError::code`], which is what
/// the host-facing API reports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IconError {
    /// No icon could be discovered, or the asset does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote host was unreachable or timed out.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The bytes are not an image we can decode.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The reference kind cannot be transformed.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Storage I/O failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The request itself is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl IconError {
    /// The stable error code reported to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::NetworkError(_) => "NetworkError",
            Self::DecodeFailed(_) => "DecodeFailed",
            Self::Unsupported(_) => "Unsupported",
            Self::WriteFailed(_) => "WriteFailed",
            Self::InvalidInput(_) => "InvalidInput",
        }
    }

    pub(crate) fn write(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::WriteFailed(format!("{context}: {err}"))
    }
}

impl From<NetworkError> for IconError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::InvalidUrl(msg) => Self::InvalidInput(format!("invalid URL: {msg}")),
            NetworkError::NoIcon(domain) => Self::NotFound(format!("no icon found for {domain}")),
            NetworkError::HttpStatus { .. } | NetworkError::NotAnImage { .. } => {
                Self::NotFound(err.to_string())
            }
            other => Self::NetworkError(other.to_string()),
        }
    }
}

impl From<RenderError> for IconError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::UnknownColor(name) => {
                Self::InvalidInput(format!("unknown theme color '{name}'"))
            }
            other => Self::DecodeFailed(other.to_string()),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, IconError>;
