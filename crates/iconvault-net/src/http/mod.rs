//! HTTP client for iconvault.
//!
//! A thin wrapper over `reqwest` with the defaults favicon probing needs:
//! short timeouts, a bounded redirect chain and bounded body reads.
//!
//! # Example
//!
//! ```ignore
//! use iconvault_net::http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(3))
//!     .max_body_bytes(1024 * 1024)
//!     .build()?;
//!
//! let response = client.get("https://example.com/favicon.ico").send().await?;
//! let bytes = response.error_for_status()?.bytes_limited().await?;
//! ```

mod client;
mod request;
mod response;

pub use client::{
    DEFAULT_MAX_BODY_BYTES, HttpClient, HttpClientBuilder, HttpClientConfig, MAX_REDIRECTS,
};
pub use request::HttpRequestBuilder;
pub use response::HttpResponse;
