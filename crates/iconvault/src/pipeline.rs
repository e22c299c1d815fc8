//! Fetch and convert orchestration.
//!
//! [`IconPipeline`] ties the resolver, the asset store, the transform engine
//! and the catalog materializer together. It is cheap to clone and safe to
//! share between request handlers.
//!
//! # Failure isolation
//!
//! Single-item operations return an [`IconError`]. [`IconPipeline::batch_fetch`]
//! never fails because of an item: each item's error is recorded in the
//! summary and the other items carry on.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use iconvault_net::{HttpClient, OriginResolver, ResolveMode};
use iconvault_render::{IconImage, Transform, TransformOutput};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{IconError, Result};
use crate::materialize::Materializer;
use crate::reference::IconReference;
use crate::store::{AssetStore, ServedAsset, Theme, Variant, grayscale_name, variant_name};

const TARGET: &str = "iconvault::pipeline";

/// A transform to derive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "color", rename_all = "lowercase")]
pub enum TransformKind {
    /// Recolor to a theme color name (or `#rrggbb`).
    Color(String),
    Grayscale,
    Invert,
}

/// One conversion to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    /// The icon to derive from. Derived references are traced back to their
    /// canonical asset first.
    pub source: IconReference,
    pub kind: TransformKind,
    /// The owning item, used to name materialized catalog icons.
    pub owner_hint: Option<String>,
}

impl ConversionRequest {
    pub fn new(source: IconReference, kind: TransformKind) -> Self {
        Self {
            source,
            kind,
            owner_hint: None,
        }
    }

    pub fn with_owner_hint(mut self, hint: impl Into<String>) -> Self {
        self.owner_hint = Some(hint.into());
        self
    }
}

/// Result of a successful fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// The stored canonical asset.
    pub reference: IconReference,
    /// The domain the icon was resolved for.
    pub domain: String,
}

/// Result of a successful conversion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// The reference to store on the item. For grayscale this is the
    /// mode-free name that serves the right variant per theme.
    pub reference: IconReference,
    /// The canonical asset the variant was derived from.
    pub original: IconReference,
    /// Every file written.
    pub files: Vec<String>,
}

/// One batch entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

impl BatchItem {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            name: None,
            section: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// Lifecycle of a batch item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Pending,
    Fetching,
    Stored,
    Failed,
}

/// A batch item that did not get an icon, with what a follow-up manual
/// selection needs to show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: i64,
    pub name: Option<String>,
    pub url: String,
    pub section: Option<String>,
    /// Error code, see [`IconError::code`].
    pub error: String,
    pub message: String,
}

impl BatchFailure {
    pub fn new(item: &BatchItem, err: &IconError) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            url: item.url.clone(),
            section: item.section.clone(),
            error: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-item batch result, in input order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub id: i64,
    pub state: ItemState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FetchOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<BatchFailure>,
}

/// Aggregate of a batch fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub results: Vec<BatchItemResult>,
}

impl BatchSummary {
    /// Items that failed, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.results.iter().filter_map(|r| r.failure.as_ref())
    }

    /// Items that got an icon, in input order.
    pub fn stored(&self) -> impl Iterator<Item = (i64, &FetchOutcome)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().map(|o| (r.id, o)))
    }
}

struct Inner {
    config: PipelineConfig,
    store: AssetStore,
    resolver: OriginResolver,
    materializer: Materializer,
}

/// The icon asset pipeline.
#[derive(Clone)]
pub struct IconPipeline {
    inner: Arc<Inner>,
}

impl IconPipeline {
    /// Create a pipeline, opening the asset directory and building an HTTP
    /// client from `config`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client = config
            .http_client_builder()
            .build()
            .map_err(|e| IconError::InvalidInput(format!("cannot build HTTP client: {e}")))?;
        Self::with_client(config, client)
    }

    /// Create a pipeline that sends requests through `client`.
    pub fn with_client(config: PipelineConfig, client: HttpClient) -> Result<Self> {
        let store = AssetStore::open(&config.asset_dir)?;
        let materializer =
            Materializer::new(client.clone(), store.clone(), config.remote_catalog_url.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                resolver: OriginResolver::new(client),
                store,
                materializer,
                config,
            }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.inner.store
    }

    pub fn materializer(&self) -> &Materializer {
        &self.inner.materializer
    }

    /// Find the icon for `target`, store it, and return its reference.
    ///
    /// In [`ResolveMode::Direct`] `target` is fetched as an image URL
    /// without discovery.
    pub async fn fetch_favicon(&self, target: &str, mode: ResolveMode) -> Result<FetchOutcome> {
        let icon = self.inner.resolver.resolve(target, mode).await?;

        let store = self.inner.store.clone();
        let domain = icon.domain.clone();
        let name = tokio::task::spawn_blocking(move || {
            store.save(&icon.bytes, &icon.domain, icon.kind)
        })
        .await
        .map_err(|e| IconError::WriteFailed(format!("store task failed: {e}")))??;

        tracing::info!(target: TARGET, domain = %domain, name = %name, "fetched favicon");
        Ok(FetchOutcome {
            reference: IconReference::Local(name),
            domain,
        })
    }

    /// Derive a variant from `request.source`.
    ///
    /// Catalog references are materialized first; derived references are
    /// traced back to their canonical asset so transforms never stack.
    /// Nothing is written unless every output encoded successfully.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionOutcome> {
        let transform = match &request.kind {
            TransformKind::Color(color) => Transform::theme(color)?,
            TransformKind::Grayscale => Transform::Grayscale,
            TransformKind::Invert => Transform::Invert,
        };

        let base = self.canonical_source(&request).await?;

        let store = self.inner.store.clone();
        let svg_size = self.inner.config.svg_size();
        let job_base = base.clone();
        let job_transform = transform.clone();
        let (reference, files) = tokio::task::spawn_blocking(move || {
            derive(&store, &job_base, &job_transform, svg_size)
        })
        .await
        .map_err(|e| IconError::DecodeFailed(format!("transform task failed: {e}")))??;

        tracing::info!(
            target: TARGET,
            source = %base,
            transform = %transform,
            files = ?files,
            "converted icon"
        );
        Ok(ConversionOutcome {
            reference,
            original: IconReference::Local(base),
            files,
        })
    }

    /// The canonical asset name a conversion reads from.
    async fn canonical_source(&self, request: &ConversionRequest) -> Result<String> {
        let local = match &request.source {
            IconReference::Local(name) if !name.is_empty() => name.clone(),
            IconReference::RemoteCatalog(id) if !id.is_empty() => {
                let reference = self
                    .inner
                    .materializer
                    .ensure_local(id, request.owner_hint.as_deref())
                    .await?;
                reference.local_name().map(str::to_string).ok_or_else(|| {
                    IconError::NotFound(format!("catalog icon '{id}' was not stored"))
                })?
            }
            IconReference::LibraryComponent(name) => {
                return Err(IconError::Unsupported(format!(
                    "'{name}' is a built-in icon and cannot be transformed"
                )));
            }
            other => {
                return Err(IconError::Unsupported(format!(
                    "reference '{other}' has no image to transform"
                )));
            }
        };
        self.inner.store.original_of(&local)
    }

    /// Fetch icons for many items concurrently.
    ///
    /// At most `max_concurrency` fetches run at once. Failures are recorded
    /// per item; only an empty batch is an error.
    pub async fn batch_fetch(&self, items: Vec<BatchItem>) -> Result<BatchSummary> {
        if items.is_empty() {
            return Err(IconError::InvalidInput("batch is empty".to_string()));
        }
        let total = items.len();
        for item in &items {
            tracing::debug!(target: TARGET, id = item.id, state = ?ItemState::Pending, "batch item queued");
        }

        let mut results: Vec<(usize, BatchItemResult)> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move { (index, self.fetch_item(item).await) })
            .buffer_unordered(self.inner.config.concurrency())
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let results: Vec<BatchItemResult> = results.into_iter().map(|(_, r)| r).collect();
        let successful = results.iter().filter(|r| r.state == ItemState::Stored).count();

        tracing::info!(target: TARGET, total, successful, failed = total - successful, "batch fetch finished");
        Ok(BatchSummary {
            total,
            successful,
            results,
        })
    }

    async fn fetch_item(&self, item: BatchItem) -> BatchItemResult {
        tracing::debug!(target: TARGET, id = item.id, url = %item.url, state = ?ItemState::Fetching, "batch item fetching");

        let outcome = if item.url.trim().is_empty() {
            Err(IconError::InvalidInput("item has no URL".to_string()))
        } else {
            self.fetch_favicon(&item.url, ResolveMode::Discover).await
        };

        match outcome {
            Ok(outcome) => {
                tracing::debug!(
                    target: TARGET,
                    id = item.id,
                    reference = %outcome.reference,
                    state = ?ItemState::Stored,
                    "batch item stored"
                );
                BatchItemResult {
                    id: item.id,
                    state: ItemState::Stored,
                    outcome: Some(outcome),
                    failure: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: TARGET,
                    id = item.id,
                    url = %item.url,
                    error = %err,
                    state = ?ItemState::Failed,
                    "batch item failed"
                );
                BatchItemResult {
                    id: item.id,
                    state: ItemState::Failed,
                    outcome: None,
                    failure: Some(BatchFailure::new(&item, &err)),
                }
            }
        }
    }

    /// The canonical reference behind `reference`.
    ///
    /// Derived variants resolve to the stored canonical asset (which must
    /// exist). Other references are already originals and are returned
    /// unchanged.
    pub async fn revert(&self, reference: &IconReference) -> Result<IconReference> {
        match reference {
            IconReference::Local(name) => {
                let store = self.inner.store.clone();
                let name = name.clone();
                let original = tokio::task::spawn_blocking(move || store.original_of(&name))
                    .await
                    .map_err(|e| IconError::WriteFailed(format!("store task failed: {e}")))??;
                Ok(IconReference::Local(original))
            }
            other => Ok(other.clone()),
        }
    }

    /// Read an asset for the serving endpoint.
    pub async fn serve(&self, path: &str, theme: Theme) -> Result<ServedAsset> {
        let store = self.inner.store.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || store.serve(&path, theme))
            .await
            .map_err(|e| IconError::WriteFailed(format!("store task failed: {e}")))?
    }
}

impl std::fmt::Debug for IconPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconPipeline")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Variant files a transform writes, in [`TransformOutput`] order.
fn variants_for(transform: &Transform) -> Vec<Variant> {
    match transform {
        Transform::Theme(color) => vec![Variant::Themed(color.name().to_string())],
        Transform::Grayscale => vec![Variant::GrayscaleBlack, Variant::GrayscaleWhite],
        Transform::Invert => vec![Variant::Inverted],
    }
}

/// Decode `base`, apply `transform`, encode and write the variant files.
fn derive(
    store: &AssetStore,
    base: &str,
    transform: &Transform,
    svg_size: u32,
) -> Result<(IconReference, Vec<String>)> {
    let bytes = store.read(base)?;
    let image = IconImage::decode_with_svg_size(&bytes, svg_size)?;

    let images = match transform.apply(&image) {
        TransformOutput::Single(out) => vec![out],
        TransformOutput::Pair { dark, light } => vec![dark, light],
    };

    // Encode everything before the first write.
    let mut outputs = Vec::with_capacity(images.len());
    for (variant, out) in variants_for(transform).iter().zip(&images) {
        outputs.push((variant_name(base, variant), out.to_png()?));
    }
    store.write_derived(&outputs)?;

    let reference = match transform {
        Transform::Grayscale => grayscale_name(base),
        Transform::Theme(color) => variant_name(base, &Variant::Themed(color.name().to_string())),
        Transform::Invert => variant_name(base, &Variant::Inverted),
    };
    let files = outputs.into_iter().map(|(name, _)| name).collect();
    Ok((IconReference::Local(reference), files))
}
