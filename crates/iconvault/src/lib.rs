//! iconvault: the icon asset pipeline of a personal dashboard.
//!
//! Bookmarks, services and categories each carry an icon as a tagged string
//! (see [`IconReference`]). This crate turns those strings into images:
//!
//! - **Fetch**: find a site's favicon and store a canonical copy
//!   ([`IconPipeline::fetch_favicon`], [`IconPipeline::batch_fetch`]).
//! - **Convert**: derive themed, grayscale or inverted variants from a
//!   canonical copy ([`IconPipeline::convert`]).
//! - **Serve**: read an asset for display, picking the grayscale variant that
//!   matches the current theme ([`IconPipeline::serve`]).
//! - **Revert**: go back from a variant to its original
//!   ([`IconPipeline::revert`]).
//!
//! All state is the asset directory itself: variant names are the canonical
//! name plus a suffix, so no side database is needed.
//!
//! # Example
//!
//! ```no_run
//! use iconvault::{ConversionRequest, IconPipeline, PipelineConfig, ResolveMode, TransformKind};
//!
//! # async fn example() -> iconvault::Result<()> {
//! let pipeline = IconPipeline::new(PipelineConfig::new("/var/lib/dashboard/favicons"))?;
//!
//! let fetched = pipeline.fetch_favicon("github.com", ResolveMode::Discover).await?;
//! let themed = pipeline
//!     .convert(ConversionRequest::new(
//!         fetched.reference,
//!         TransformKind::Color("Slate".into()),
//!     ))
//!     .await?;
//! println!("{}", themed.reference); // favicon:github_com_themed_Slate.png
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
mod error;
pub mod materialize;
pub mod pipeline;
pub mod reference;
pub mod store;

pub use config::{ConfigError, PipelineConfig};
pub use error::{IconError, Result};
pub use materialize::Materializer;
pub use pipeline::{
    BatchFailure, BatchItem, BatchItemResult, BatchSummary, ConversionOutcome, ConversionRequest,
    FetchOutcome, IconPipeline, ItemState, TransformKind,
};
pub use reference::{DisplaySource, IconReference};
pub use store::{AssetStore, ServedAsset, Theme, strip_transform_suffix};

pub use iconvault_net::ResolveMode;
