//! Favicon discovery for arbitrary origins.
//!
//! Given a user-supplied URL, [`OriginResolver`] finds the best icon the
//! origin publishes. Candidates are tried richest first and the first one
//! that answers 2xx with image content wins:
//!
//! 1. `<link rel="apple-touch-icon">` (and `-precomposed`)
//! 2. `<link rel="shortcut icon">` / `<link rel="icon">`
//! 3. icons declared by `<link rel="manifest">`
//! 4. `/favicon.ico` at the origin root
//!
//! Every failure mode, from an unreachable host to a soft-404 HTML page,
//! collapses into [`NetworkError::NoIcon`]. Callers never see a partial
//! result.
//!
//! ```ignore
//! let resolver = OriginResolver::new(client);
//! let icon = resolver.resolve("github.com", ResolveMode::Discover).await?;
//! println!("{} bytes from {} for {}", icon.bytes.len(), icon.source_url, icon.domain);
//! ```

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::content::{ImageKind, accept_image};
use crate::error::{NetworkError, Result};
use crate::http::HttpClient;

const TARGET: &str = "iconvault_net::discovery";

/// Upper bound on link-tag candidates probed per origin, excluding the
/// well-known fallback.
const MAX_LINK_CANDIDATES: usize = 6;

static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("static regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static regex")
});

/// Where a candidate icon URL came from. Ordering is preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CandidateSource {
    /// Caller supplied the image URL directly.
    Direct,
    /// `<link rel="apple-touch-icon">`.
    AppleTouchIcon,
    /// `<link rel="shortcut icon">` or `<link rel="icon">`.
    LinkIcon,
    /// An entry of the web app manifest `icons` array.
    Manifest,
    /// The conventional `/favicon.ico`.
    WellKnown,
}

/// A URL worth probing for an icon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconCandidate {
    /// Absolute icon URL.
    pub url: Url,
    /// How the URL was discovered.
    pub source: CandidateSource,
    /// Largest edge declared by `sizes`, when present.
    pub declared_size: Option<u32>,
}

/// How [`OriginResolver::resolve`] treats its input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolveMode {
    /// Probe the origin for icon hints.
    #[default]
    Discover,
    /// The input already is an image URL; fetch it as-is.
    Direct,
}

/// A successfully downloaded icon.
#[derive(Clone, Debug)]
pub struct ResolvedIcon {
    /// URL the bytes were read from (after redirects).
    pub source_url: Url,
    /// Registrable-ish host of the target, without `www.`.
    pub domain: String,
    /// Raw image bytes, exactly as served.
    pub bytes: Bytes,
    /// Format identified from the bytes or the content type.
    pub kind: ImageKind,
    /// Which candidate produced the icon.
    pub source: CandidateSource,
}

/// Normalize a user-supplied URL: trims whitespace, prepends `https://`
/// when no scheme is present, and requires an http(s) URL with a host.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NetworkError::InvalidUrl("empty URL".to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };
    let url = Url::parse(&with_scheme)?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(NetworkError::InvalidUrl(format!(
                "unsupported scheme '{other}'"
            )));
        }
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(NetworkError::InvalidUrl(format!("no host in '{raw}'")));
    }
    Ok(url)
}

/// The host of `url`, lowercased and without a leading `www.`.
pub fn domain_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// The root of the origin serving `url` (`scheme://host[:port]/`).
pub fn origin_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Extract icon candidates and the manifest URL from an HTML document.
///
/// Candidates are returned in preference order; within a group, larger
/// declared sizes come first and document order breaks ties.
pub fn scan_link_tags(html: &str, base: &Url) -> (Vec<IconCandidate>, Option<Url>) {
    let mut candidates = Vec::new();
    let mut manifest = None;

    for tag in LINK_TAG.find_iter(html) {
        let mut rel = None;
        let mut href = None;
        let mut sizes = None;
        for cap in ATTRIBUTE.captures_iter(tag.as_str()) {
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| decode_entities(m.as_str().trim()));
            match cap[1].to_ascii_lowercase().as_str() {
                "rel" => rel = value.map(|v| v.to_ascii_lowercase()),
                "href" => href = value,
                "sizes" => sizes = value,
                _ => {}
            }
        }

        let (Some(rel), Some(href)) = (rel, href) else {
            continue;
        };
        if href.is_empty() || href.starts_with("data:") {
            continue;
        }
        let Ok(url) = base.join(&href) else {
            continue;
        };

        let tokens: Vec<&str> = rel.split_ascii_whitespace().collect();
        let source = if tokens
            .iter()
            .any(|t| *t == "apple-touch-icon" || *t == "apple-touch-icon-precomposed")
        {
            CandidateSource::AppleTouchIcon
        } else if tokens.contains(&"icon") {
            CandidateSource::LinkIcon
        } else if tokens.contains(&"manifest") {
            manifest.get_or_insert(url);
            continue;
        } else {
            continue;
        };

        candidates.push(IconCandidate {
            url,
            source,
            declared_size: sizes.as_deref().and_then(largest_size),
        });
    }

    // Stable sort keeps document order inside each group.
    candidates.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| b.declared_size.cmp(&a.declared_size))
    });
    candidates.dedup_by(|a, b| a.url == b.url);
    (candidates, manifest)
}

/// Parse the icons of a web app manifest, largest declared size first.
pub fn parse_manifest_icons(json: &str, manifest_url: &Url) -> Vec<IconCandidate> {
    #[derive(Deserialize)]
    struct Manifest {
        #[serde(default)]
        icons: Vec<ManifestIcon>,
    }

    #[derive(Deserialize)]
    struct ManifestIcon {
        src: String,
        #[serde(default)]
        sizes: Option<String>,
    }

    let Ok(manifest) = serde_json::from_str::<Manifest>(json) else {
        return Vec::new();
    };

    let mut icons: Vec<IconCandidate> = manifest
        .icons
        .into_iter()
        .filter_map(|icon| {
            let url = manifest_url.join(icon.src.trim()).ok()?;
            Some(IconCandidate {
                url,
                source: CandidateSource::Manifest,
                declared_size: icon.sizes.as_deref().and_then(largest_size),
            })
        })
        .collect();
    icons.sort_by(|a, b| b.declared_size.cmp(&a.declared_size));
    icons
}

/// Largest edge in a `sizes` attribute such as `"16x16 32x32"`. `any`
/// (scalable) ranks above every fixed size.
fn largest_size(sizes: &str) -> Option<u32> {
    sizes
        .split_ascii_whitespace()
        .filter_map(|s| {
            if s.eq_ignore_ascii_case("any") {
                return Some(u32::MAX);
            }
            let (w, h) = s.to_ascii_lowercase().split_once('x').map(|(w, h)| {
                (w.parse::<u32>().ok(), h.parse::<u32>().ok())
            })?;
            Some(w?.max(h?))
        })
        .max()
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&#38;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Discovers and downloads the favicon of an origin.
#[derive(Clone, Debug)]
pub struct OriginResolver {
    client: HttpClient,
}

impl OriginResolver {
    /// Create a resolver using `client` for every probe. The client's
    /// timeout is the per-candidate timebox.
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Get the underlying client.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Resolve `target` to icon bytes.
    ///
    /// Returns [`NetworkError::InvalidUrl`] when the target cannot be
    /// normalized and [`NetworkError::NoIcon`] when nothing usable was
    /// found.
    pub async fn resolve(&self, target: &str, mode: ResolveMode) -> Result<ResolvedIcon> {
        let url = normalize_url(target)?;
        let domain = domain_of(&url);

        if mode == ResolveMode::Direct {
            let candidate = IconCandidate {
                url,
                source: CandidateSource::Direct,
                declared_size: None,
            };
            return self
                .try_candidate(&candidate, &domain)
                .await
                .map_err(|err| {
                    tracing::debug!(target: TARGET, url = %candidate.url, error = %err, "direct icon fetch failed");
                    NetworkError::NoIcon(domain.clone())
                });
        }

        for candidate in self.candidates(&url).await {
            match self.try_candidate(&candidate, &domain).await {
                Ok(icon) => {
                    tracing::debug!(
                        target: TARGET,
                        url = %icon.source_url,
                        source = ?icon.source,
                        "icon resolved"
                    );
                    return Ok(icon);
                }
                Err(err) => {
                    tracing::debug!(target: TARGET, url = %candidate.url, error = %err, "candidate rejected");
                }
            }
        }

        Err(NetworkError::NoIcon(domain))
    }

    /// Every candidate for `url`'s origin, in probe order, ending with the
    /// well-known `/favicon.ico`.
    pub async fn candidates(&self, url: &Url) -> Vec<IconCandidate> {
        let root = origin_root(url);
        let mut candidates = Vec::new();

        match self.fetch_text(&root).await {
            Ok((html, final_url)) => {
                let (mut links, manifest) = scan_link_tags(&html, &final_url);
                links.truncate(MAX_LINK_CANDIDATES);
                candidates.append(&mut links);
                if let Some(manifest_url) = manifest {
                    match self.fetch_text(&manifest_url).await {
                        Ok((json, final_manifest_url)) => {
                            let mut icons = parse_manifest_icons(&json, &final_manifest_url);
                            icons.truncate(MAX_LINK_CANDIDATES.saturating_sub(candidates.len()));
                            candidates.append(&mut icons);
                        }
                        Err(err) => {
                            tracing::debug!(target: TARGET, url = %manifest_url, error = %err, "manifest unavailable");
                        }
                    }
                }
            }
            Err(err) => {
                tracing::debug!(target: TARGET, url = %root, error = %err, "root document unavailable");
            }
        }

        if let Ok(well_known) = root.join("/favicon.ico")
            && !candidates.iter().any(|c| c.url == well_known)
        {
            candidates.push(IconCandidate {
                url: well_known,
                source: CandidateSource::WellKnown,
                declared_size: None,
            });
        }
        candidates
    }

    async fn fetch_text(&self, url: &Url) -> Result<(String, Url)> {
        let response = self.client.get(url.as_str()).send().await?.error_for_status()?;
        let final_url = response.url().clone();
        Ok((response.text_limited().await?, final_url))
    }

    async fn try_candidate(&self, candidate: &IconCandidate, domain: &str) -> Result<ResolvedIcon> {
        let response = self
            .client
            .get(candidate.url.as_str())
            .header("accept", "image/*,*/*;q=0.5")
            .send()
            .await?
            .error_for_status()?;
        let media_type = response.media_type();
        let source_url = response.url().clone();
        let bytes = response.bytes_limited().await?;

        let kind = accept_image(media_type.as_deref(), &bytes)
            .ok_or(NetworkError::NotAnImage { content_type: media_type })?;

        Ok(ResolvedIcon {
            source_url,
            domain: domain.to_string(),
            bytes,
            kind,
            source: candidate.source,
        })
    }
}
