//! Pipeline configuration.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes:
//!
//! ```toml
//! asset_dir = "/var/lib/dashboard/favicons"
//! fetch_timeout_ms = 3000
//! max_concurrency = 8
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use iconvault_net::{HttpClient, HttpClientBuilder};
use iconvault_render::DEFAULT_SVG_RASTER_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default remote catalog URL pattern.
pub const DEFAULT_REMOTE_CATALOG_URL: &str =
    "https://cdn.jsdelivr.net/gh/selfhst/icons/png/{id}.png";

/// Errors loading or saving a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings for [`IconPipeline`](crate::IconPipeline).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding every stored icon.
    pub asset_dir: PathBuf,
    /// Per-request timeout for every outbound fetch.
    pub fetch_timeout_ms: u64,
    /// Connection establishment timeout.
    pub connect_timeout_ms: u64,
    /// Batch fetches running at once.
    pub max_concurrency: usize,
    /// Largest icon body accepted, in bytes.
    pub max_icon_bytes: u64,
    /// Remote catalog URL with an `{id}` placeholder.
    pub remote_catalog_url: String,
    /// Longer edge, in pixels, SVG sources are rasterized at.
    pub svg_raster_size: u32,
    /// User agent sent with outbound requests.
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
            fetch_timeout_ms: 5_000,
            connect_timeout_ms: 3_000,
            max_concurrency: 6,
            max_icon_bytes: 5 * 1024 * 1024,
            remote_catalog_url: DEFAULT_REMOTE_CATALOG_URL.to_string(),
            svg_raster_size: DEFAULT_SVG_RASTER_SIZE,
            user_agent: format!("iconvault/{} (Rust)", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// The platform data directory plus `favicons`, or a directory under the
/// system temp dir when no home directory is known.
pub fn default_asset_dir() -> PathBuf {
    ProjectDirs::from("", "", "iconvault")
        .map(|dirs| dirs.data_dir().join("favicons"))
        .unwrap_or_else(|| std::env::temp_dir().join("iconvault").join("favicons"))
}

impl PipelineConfig {
    /// Defaults with the asset namespace at `asset_dir`.
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            ..Self::default()
        }
    }

    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn with_max_icon_bytes(mut self, limit: u64) -> Self {
        self.max_icon_bytes = limit;
        self
    }

    pub fn with_remote_catalog_url(mut self, pattern: impl Into<String>) -> Self {
        self.remote_catalog_url = pattern.into();
        self
    }

    pub fn with_svg_raster_size(mut self, size: u32) -> Self {
        self.svg_raster_size = size;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Batch parallelism, never below one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// SVG raster edge, never below one.
    pub fn svg_size(&self) -> u32 {
        self.svg_raster_size.max(1)
    }

    /// An HTTP client builder carrying these timeouts and limits.
    pub fn http_client_builder(&self) -> HttpClientBuilder {
        HttpClient::builder()
            .timeout(self.fetch_timeout())
            .connect_timeout(self.connect_timeout())
            .max_body_bytes(self.max_icon_bytes)
            .user_agent(self.user_agent.clone())
    }
}
