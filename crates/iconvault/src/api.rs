//! Host-facing API.
//!
//! The host application owns routing and the item database. This module
//! defines the request/response bodies for the four icon endpoints and an
//! [`IconService`] that answers them, reading and writing items through the
//! [`ItemStore`] and [`ThemeSource`] traits.
//!
//! Responses never carry a Rust error: failures are reported as
//! `success: false` with the error code from [`IconError::code`].

use iconvault_net::ResolveMode;
use serde::{Deserialize, Serialize};

use crate::error::{IconError, Result};
use crate::pipeline::{
    BatchFailure, BatchItem, ConversionRequest, IconPipeline, ItemState, TransformKind,
};
use crate::reference::IconReference;
use crate::store::{ServedAsset, Theme};

const TARGET: &str = "iconvault::api";

/// Kinds of items that carry an icon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Bookmark,
    Service,
    Category,
    SiteFavicon,
}

impl ItemKind {
    /// Whether batch fetches accept this kind.
    pub fn is_batchable(self) -> bool {
        matches!(self, Self::Bookmark | Self::Service)
    }
}

/// What the pipeline needs to know about an item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    /// The category or section the item sits in.
    pub section: Option<String>,
    pub icon: IconReference,
}

/// The host's item database.
pub trait ItemStore: Send + Sync {
    /// Look up an item.
    fn item(&self, kind: ItemKind, id: i64) -> Option<ItemRecord>;

    /// Replace an item's icon reference.
    fn set_icon(&self, kind: ItemKind, id: i64, icon: &IconReference) -> Result<()>;
}

/// The host's theme settings.
pub trait ThemeSource: Send + Sync {
    /// The current theme color name, if one is set.
    fn theme_color(&self) -> Option<String>;
}

/// `fetch` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub url: String,
    /// Treat `url` as the image itself and skip discovery.
    #[serde(default)]
    pub direct_url_mode: bool,
}

/// `fetch` response body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub success: bool,
    /// The stored reference, e.g. `favicon:github_com.png`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Transform names accepted by `convert`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertKind {
    Color,
    Grayscale,
    Invert,
}

/// `convert` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub kind: ConvertKind,
    /// The source icon reference.
    pub favicon: String,
    /// Theme color for `color`; the current theme color when absent.
    #[serde(default)]
    pub color: Option<String>,
    /// URL of the owning item.
    #[serde(default)]
    pub item_url: Option<String>,
}

/// `convert` response body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    /// The new reference to store on the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `batch` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<i64>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

/// `batch` response body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub total: usize,
    pub successful: usize,
    /// Items still without an icon, for manual selection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BatchFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `serve` query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeRequest {
    pub path: String,
    #[serde(default)]
    pub theme: Option<Theme>,
}

/// Answers icon API requests against a pipeline and the host's collaborators.
pub struct IconService<S, T> {
    pipeline: IconPipeline,
    items: S,
    theme: T,
}

impl<S: ItemStore, T: ThemeSource> IconService<S, T> {
    pub fn new(pipeline: IconPipeline, items: S, theme: T) -> Self {
        Self {
            pipeline,
            items,
            theme,
        }
    }

    pub fn pipeline(&self) -> &IconPipeline {
        &self.pipeline
    }

    pub fn items(&self) -> &S {
        &self.items
    }

    /// Handle `fetch`.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        let mode = if request.direct_url_mode {
            ResolveMode::Direct
        } else {
            ResolveMode::Discover
        };
        match self.pipeline.fetch_favicon(&request.url, mode).await {
            Ok(outcome) => FetchResponse {
                success: true,
                path: Some(outcome.reference.to_string()),
                domain: Some(outcome.domain),
                error: None,
            },
            Err(err) => {
                tracing::debug!(target: TARGET, url = %request.url, error = %err, "fetch failed");
                FetchResponse {
                    error: Some(err.code().to_string()),
                    ..FetchResponse::default()
                }
            }
        }
    }

    /// Handle `convert`.
    pub async fn convert(&self, request: &ConvertRequest) -> ConvertResponse {
        match self.try_convert(request).await {
            Ok(reference) => ConvertResponse {
                success: true,
                filename: Some(reference.to_string()),
                error: None,
            },
            Err(err) => {
                tracing::debug!(target: TARGET, favicon = %request.favicon, error = %err, "convert failed");
                ConvertResponse {
                    error: Some(err.code().to_string()),
                    ..ConvertResponse::default()
                }
            }
        }
    }

    async fn try_convert(&self, request: &ConvertRequest) -> Result<IconReference> {
        let kind = match request.kind {
            ConvertKind::Color => {
                let color = request
                    .color
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .or_else(|| self.theme.theme_color())
                    .ok_or_else(|| IconError::InvalidInput("no theme color set".to_string()))?;
                TransformKind::Color(color)
            }
            ConvertKind::Grayscale => TransformKind::Grayscale,
            ConvertKind::Invert => TransformKind::Invert,
        };

        let mut conversion = ConversionRequest::new(IconReference::parse(&request.favicon), kind);
        if let Some(hint) = request.item_url.as_deref().filter(|u| !u.trim().is_empty()) {
            conversion = conversion.with_owner_hint(hint);
        }
        Ok(self.pipeline.convert(conversion).await?.reference)
    }

    /// Handle `batch`: fetch icons for the listed items and store the new
    /// references on every item that got one.
    pub async fn batch(&self, request: &BatchRequest) -> BatchResponse {
        if !request.kind.is_batchable() {
            return Self::batch_error(IconError::InvalidInput(format!(
                "batch fetch does not support {:?} items",
                request.kind
            )));
        }
        if request.ids.is_empty() {
            return Self::batch_error(IconError::InvalidInput("batch is empty".to_string()));
        }

        // Ids the store does not know fail without a fetch.
        let mut failures = Vec::new();
        let mut items = Vec::new();
        for &id in &request.ids {
            match self.items.item(request.kind, id) {
                Some(record) => items.push(BatchItem {
                    id,
                    url: record.url.unwrap_or_default(),
                    name: Some(record.name),
                    section: record.section,
                }),
                None => {
                    let err = IconError::NotFound(format!("no {:?} with id {id}", request.kind));
                    failures.push(BatchFailure::new(&BatchItem::new(id, ""), &err));
                }
            }
        }

        let mut successful = 0;
        if !items.is_empty() {
            let summary = match self.pipeline.batch_fetch(items.clone()).await {
                Ok(summary) => summary,
                Err(err) => return Self::batch_error(err),
            };
            for (result, item) in summary.results.into_iter().zip(&items) {
                match (result.state, result.outcome, result.failure) {
                    (ItemState::Stored, Some(outcome), _) => {
                        match self.items.set_icon(request.kind, item.id, &outcome.reference) {
                            Ok(()) => successful += 1,
                            Err(err) => {
                                tracing::warn!(target: TARGET, id = item.id, error = %err, "cannot save icon on item");
                                failures.push(BatchFailure::new(item, &err));
                            }
                        }
                    }
                    (_, _, Some(failure)) => failures.push(failure),
                    _ => failures.push(BatchFailure::new(
                        item,
                        &IconError::NotFound("no result".to_string()),
                    )),
                }
            }
        }

        // Report failures in request order.
        failures.sort_by_key(|f| request.ids.iter().position(|&id| id == f.id));

        BatchResponse {
            success: true,
            total: request.ids.len(),
            successful,
            failures,
            error: None,
        }
    }

    fn batch_error(err: IconError) -> BatchResponse {
        tracing::debug!(target: TARGET, error = %err, "batch rejected");
        BatchResponse {
            error: Some(err.code().to_string()),
            ..BatchResponse::default()
        }
    }

    /// Handle `serve`. `NotFound` means the endpoint answers 404.
    pub async fn serve(&self, request: &ServeRequest) -> Result<ServedAsset> {
        self.pipeline
            .serve(&request.path, request.theme.unwrap_or_default())
            .await
    }

    /// Point an item back at its canonical icon.
    pub async fn revert(&self, kind: ItemKind, id: i64) -> Result<IconReference> {
        let record = self
            .items
            .item(kind, id)
            .ok_or_else(|| IconError::NotFound(format!("no {kind:?} with id {id}")))?;
        let original = self.pipeline.revert(&record.icon).await?;
        if original != record.icon {
            self.items.set_icon(kind, id, &original)?;
        }
        Ok(original)
    }
}
