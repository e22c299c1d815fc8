//! Icon references.
//!
//! Items carry their icon as one string column. The string form is tagged by
//! prefix:
//!
//! | String            | Variant                               |
//! |-------------------|---------------------------------------|
//! | `favicon:<name>`  | [`IconReference::Local`]              |
//! | `selfhst:<id>`    | [`IconReference::RemoteCatalog`]      |
//! | `""`              | [`IconReference::Empty`]              |
//! | anything else     | [`IconReference::LibraryComponent`]   |
//!
//! Parsing is total and `parse(s).to_string() == s` for every `s`, so values
//! written by older versions or edited by hand survive a load/save cycle.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{has_transform_suffix, strip_transform_suffix};

/// Prefix of references to files in the asset store.
pub const LOCAL_PREFIX: &str = "favicon:";

/// Prefix of references to the remote icon catalog.
pub const REMOTE_PREFIX: &str = "selfhst:";

/// Where an item's icon comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IconReference {
    /// A file in the asset store, possibly a derived variant.
    Local(String),
    /// An icon in the remote catalog, by id.
    RemoteCatalog(String),
    /// A built-in vector icon, by name.
    LibraryComponent(String),
    /// No icon.
    #[default]
    Empty,
}

/// What a renderer should draw for a reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplaySource {
    /// A file in the asset store.
    LocalFile(String),
    /// A remote image URL.
    RemoteUrl(String),
    /// A built-in component.
    Component(String),
    None,
}

impl IconReference {
    /// Classify a stored string. Never fails.
    pub fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(LOCAL_PREFIX) {
            Self::Local(name.to_string())
        } else if let Some(id) = raw.strip_prefix(REMOTE_PREFIX) {
            Self::RemoteCatalog(id.to_string())
        } else if raw.is_empty() {
            Self::Empty
        } else {
            Self::LibraryComponent(raw.to_string())
        }
    }

    /// A reference to a stored asset.
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    /// The stored file name, for local references.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Self::Local(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether a transform can be derived from this reference: stored files
    /// and catalog icons have pixels, components and empty references don't.
    pub fn is_transformable(&self) -> bool {
        match self {
            Self::Local(name) | Self::RemoteCatalog(name) => !name.is_empty(),
            Self::LibraryComponent(_) | Self::Empty => false,
        }
    }

    /// Whether this points at a derived variant.
    pub fn is_transformed(&self) -> bool {
        self.local_name().is_some_and(has_transform_suffix)
    }

    /// The reference with any transform suffix removed.
    ///
    /// Computed from the string alone. The extension is kept as written, so
    /// for a canonical asset stored as ICO or SVG the result names the right
    /// stem but the variant's `.png`; `IconPipeline::revert` resolves the
    /// actual file.
    pub fn original(&self) -> Self {
        match self {
            Self::Local(name) => Self::Local(strip_transform_suffix(name)),
            other => other.clone(),
        }
    }

    /// What to draw. `catalog_pattern` is the remote catalog URL with an
    /// `{id}` placeholder.
    pub fn display_source(&self, catalog_pattern: &str) -> DisplaySource {
        match self {
            Self::Local(name) => DisplaySource::LocalFile(name.clone()),
            Self::RemoteCatalog(id) => DisplaySource::RemoteUrl(catalog_url(catalog_pattern, id)),
            Self::LibraryComponent(name) => DisplaySource::Component(name.clone()),
            Self::Empty => DisplaySource::None,
        }
    }
}

/// Fill the `{id}` placeholder of a catalog URL pattern.
pub fn catalog_url(pattern: &str, id: &str) -> String {
    pattern.replace("{id}", id)
}

impl fmt::Display for IconReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "{LOCAL_PREFIX}{name}"),
            Self::RemoteCatalog(id) => write!(f, "{REMOTE_PREFIX}{id}"),
            Self::LibraryComponent(name) => f.write_str(name),
            Self::Empty => Ok(()),
        }
    }
}

impl FromStr for IconReference {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for IconReference {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for IconReference {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<IconReference> for String {
    fn from(reference: IconReference) -> Self {
        reference.to_string()
    }
}
