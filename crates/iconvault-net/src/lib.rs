//! Networking for iconvault.
//!
//! This crate provides the outbound side of the icon pipeline:
//!
//! - **HTTP Client**: a `reqwest` wrapper with short timeouts and bounded
//!   body reads, see [`http`].
//! - **Discovery**: finding the favicon an origin publishes, see
//!   [`discovery::OriginResolver`].
//! - **Content sniffing**: telling images from error pages by their bytes,
//!   see [`ImageKind`].
//!
//! # Discovery
//!
//! ```ignore
//! use iconvault_net::{HttpClient, OriginResolver, ResolveMode};
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//! let resolver = OriginResolver::new(client);
//!
//! // Probe link tags, the manifest, then /favicon.ico
//! let icon = resolver.resolve("github.com", ResolveMode::Discover).await?;
//!
//! // Or fetch a known image URL as-is
//! let icon = resolver
//!     .resolve("https://example.com/logo.png", ResolveMode::Direct)
//!     .await?;
//! ```

mod content;
pub mod discovery;
mod error;
pub mod http;

pub use content::{ImageKind, accept_image};
pub use discovery::{
    CandidateSource, IconCandidate, OriginResolver, ResolveMode, ResolvedIcon, domain_of,
    normalize_url,
};
pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpResponse};
