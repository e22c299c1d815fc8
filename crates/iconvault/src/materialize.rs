//! Remote catalog materialization.
//!
//! Catalog icons are displayed straight from the CDN. Before one can be
//! transformed it is downloaded into the asset store under a deterministic
//! name, so the variant's stripped name still points at a local canonical
//! file.

use iconvault_net::{HttpClient, NetworkError, accept_image};

use crate::error::{IconError, Result};
use crate::reference::{IconReference, catalog_url};
use crate::store::{AssetStore, is_valid_name, sanitize_base_name};

const TARGET: &str = "iconvault::materialize";

/// Downloads catalog icons into the asset store.
#[derive(Clone, Debug)]
pub struct Materializer {
    client: HttpClient,
    store: AssetStore,
    catalog_pattern: String,
}

impl Materializer {
    pub fn new(client: HttpClient, store: AssetStore, catalog_pattern: impl Into<String>) -> Self {
        Self {
            client,
            store,
            catalog_pattern: catalog_pattern.into(),
        }
    }

    /// The stem a catalog icon is stored under. `owner_hint` (typically the
    /// owning item's URL) keeps icons for different items apart.
    ///
    /// The `-selfhst-` separator never appears in a sanitized site name, so a
    /// fetched favicon cannot be mistaken for a catalog icon.
    pub fn stem_for(id: &str, owner_hint: Option<&str>) -> String {
        let id = sanitize_base_name(id);
        match owner_hint.map(str::trim).filter(|hint| !hint.is_empty()) {
            Some(hint) => {
                let hint = hint
                    .split_once("://")
                    .map_or(hint, |(_, rest)| rest)
                    .split(['/', '?', '#'])
                    .next()
                    .unwrap_or(hint);
                format!("{}-selfhst-{id}", sanitize_base_name(hint))
            }
            None => format!("selfhst-{id}"),
        }
    }

    /// Make sure catalog icon `id` is stored locally and return its
    /// reference. An icon already stored under the same name is reused.
    pub async fn ensure_local(&self, id: &str, owner_hint: Option<&str>) -> Result<IconReference> {
        let id = id.trim();
        if id.is_empty() || !is_valid_name(id) {
            return Err(IconError::InvalidInput(format!("invalid catalog id '{id}'")));
        }

        let stem = Self::stem_for(id, owner_hint);
        if let Some(existing) = self.store.find_by_stem(&stem)? {
            tracing::debug!(target: TARGET, id, name = %existing, "catalog icon already local");
            return Ok(IconReference::Local(existing));
        }

        let url = catalog_url(&self.catalog_pattern, id);
        tracing::debug!(target: TARGET, id, url = %url, "downloading catalog icon");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.download_error(id, err))?
            .error_for_status()
            .map_err(|err| self.download_error(id, err))?;
        let media_type = response.media_type();
        let bytes = response
            .bytes_limited()
            .await
            .map_err(|err| self.download_error(id, err))?;

        let kind = accept_image(media_type.as_deref(), &bytes).ok_or_else(|| {
            IconError::NotFound(format!("catalog icon '{id}' is not an image"))
        })?;

        let store = self.store.clone();
        let name = tokio::task::spawn_blocking(move || store.save_as(&bytes, &stem, kind))
            .await
            .map_err(|e| IconError::WriteFailed(format!("store task failed: {e}")))??;

        tracing::info!(target: TARGET, id, name = %name, "materialized catalog icon");
        Ok(IconReference::Local(name))
    }

    fn download_error(&self, id: &str, err: NetworkError) -> IconError {
        tracing::debug!(target: TARGET, id, error = %err, "catalog download failed");
        match err {
            NetworkError::HttpStatus { status } => {
                IconError::NotFound(format!("catalog icon '{id}' unavailable (HTTP {status})"))
            }
            other => other.into(),
        }
    }
}
