//! HTTP response types.

use bytes::{Bytes, BytesMut};

use crate::error::{NetworkError, Result};

/// An HTTP response from a request.
pub struct HttpResponse {
    inner: reqwest::Response,
    max_body_bytes: u64,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: reqwest::Response, max_body_bytes: u64) -> Self {
        Self {
            inner: response,
            max_body_bytes,
        }
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.inner
            .headers()
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get the media type of the Content-Type header, lowercased and without
    /// parameters (`image/png; charset=x` becomes `image/png`).
    pub fn media_type(&self) -> Option<String> {
        self.content_type().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Get the final URL after redirects.
    pub fn url(&self) -> &url::Url {
        self.inner.url()
    }

    /// Check if the status code indicates success, returning an error if not.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NetworkError::HttpStatus {
                status: self.status(),
            })
        }
    }

    /// Read the body, giving up as soon as it grows past the client's
    /// configured limit.
    pub async fn bytes_limited(mut self) -> Result<Bytes> {
        let limit = self.max_body_bytes;
        if let Some(len) = self.inner.content_length()
            && len > limit
        {
            return Err(NetworkError::BodyTooLarge { limit });
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.inner.chunk().await? {
            if (buffer.len() + chunk.len()) as u64 > limit {
                return Err(NetworkError::BodyTooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Read the body as text, subject to the same limit as
    /// [`bytes_limited`](Self::bytes_limited). Invalid UTF-8 is replaced.
    pub async fn text_limited(self) -> Result<String> {
        let bytes = self.bytes_limited().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status())
            .field("url", &self.url().as_str())
            .finish()
    }
}
