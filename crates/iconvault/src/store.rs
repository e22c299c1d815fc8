//! Asset store.
//!
//! Icons live as plain files in one namespace directory. File names are the
//! only metadata: a canonical asset is `<base>.<ext>` and each derived
//! variant is `<base><suffix>.png`, so the canonical asset of any variant is
//! recovered by [`strip_transform_suffix`] alone.
//!
//! Base names are unique per stem across extensions, which lets a variant
//! (always PNG) find a canonical asset stored as ICO or SVG.
//!
//! Every write goes to a temporary file in the namespace directory first and
//! is then renamed into place, so readers never observe a partial file.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use iconvault_net::ImageKind;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IconError, Result};
use crate::reference::IconReference;

const TARGET: &str = "iconvault::store";

/// Attempts at numeric disambiguation before giving up.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Longest accepted asset file name.
const MAX_NAME_LEN: usize = 255;

/// Any of the recognised transform suffix families, anchored at the end of a
/// file stem.
static TRANSFORM_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:_themed_[A-Za-z0-9]+|_grayscale(?:_black|_white)?|_inverted)$")
        .expect("static regex")
});

/// Background the icon is rendered against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = IconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(IconError::InvalidInput(format!("unknown theme '{other}'"))),
        }
    }
}

/// A derived variant of a canonical asset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Recolored to a theme color, by canonical color name.
    Themed(String),
    /// Black foreground, for light backgrounds.
    GrayscaleBlack,
    /// White foreground, for dark backgrounds.
    GrayscaleWhite,
    /// Inverted colors.
    Inverted,
}

impl Variant {
    /// The suffix appended to the base stem.
    pub fn suffix(&self) -> String {
        match self {
            Self::Themed(color) => format!("_themed_{color}"),
            Self::GrayscaleBlack => "_grayscale_black".to_string(),
            Self::GrayscaleWhite => "_grayscale_white".to_string(),
            Self::Inverted => "_inverted".to_string(),
        }
    }

    /// The grayscale variant to show against `theme`.
    pub fn grayscale_for(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self::GrayscaleBlack,
            Theme::Dark => Self::GrayscaleWhite,
        }
    }
}

/// File name of `variant` derived from the canonical asset `base_name`.
pub fn variant_name(base_name: &str, variant: &Variant) -> String {
    format!("{}{}.png", split_extension(base_name).0, variant.suffix())
}

/// The mode-free grayscale name stored in references. [`AssetStore::serve`]
/// resolves it to the black or white file for the current theme.
pub fn grayscale_name(base_name: &str) -> String {
    format!("{}_grayscale.png", split_extension(base_name).0)
}

/// Remove any transform suffix from an asset name, keeping its extension.
///
/// Names without a suffix are returned unchanged.
pub fn strip_transform_suffix(name: &str) -> String {
    let (stem, ext) = split_extension(name);
    let mut stem = stem.to_string();
    loop {
        let stripped = TRANSFORM_SUFFIX.replace(&stem, "");
        if stripped.is_empty() || stripped.len() == stem.len() {
            break;
        }
        stem = stripped.into_owned();
    }
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Whether `name` carries a transform suffix.
pub fn has_transform_suffix(name: &str) -> bool {
    strip_transform_suffix(name) != name
}

/// Turn a domain or suggested file name into a safe base stem.
///
/// `www.GitHub.com` becomes `github_com`. A stem that would read as a
/// derived variant gets an `_icon` tail.
pub fn sanitize_base_name(raw: &str) -> String {
    let raw = raw.trim().to_ascii_lowercase();
    let raw = raw.strip_prefix("www.").unwrap_or(&raw);

    let mut token = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            token.push(c);
        } else if !token.ends_with('_') {
            token.push('_');
        }
    }
    let mut token = token.trim_matches('_').to_string();
    if token.is_empty() {
        token.push_str("icon");
    }
    if TRANSFORM_SUFFIX.is_match(&token) {
        token.push_str("_icon");
    }
    token.truncate(MAX_NAME_LEN - 16);
    token
}

/// Whether `name` is a plain file name we are willing to touch.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Candidate stem number `attempt` for `base`. A numbered stem that would
/// read as a derived variant (`dark_themed_1`) moves the number behind an
/// `_icon` guard instead.
fn disambiguated_stem(base: &str, attempt: usize) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let stem = format!("{base}_{attempt}");
    if TRANSFORM_SUFFIX.is_match(&stem) {
        format!("{base}_icon_{attempt}")
    } else {
        stem
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Bytes and content type for the serving endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServedAsset {
    /// The file actually read.
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// The asset namespace on disk.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open (and create if needed) the namespace directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            tracing::error!(target: TARGET, path = %root.display(), error = %e, "cannot create asset directory");
            IconError::write(root.display(), e)
        })?;
        Ok(Self { root })
    }

    /// The namespace directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of an asset. The name must already be validated.
    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Store canonical bytes under a fresh name derived from
    /// `suggested_base`, disambiguating with `_1`, `_2`, ... on collision.
    ///
    /// Returns the stored file name.
    pub fn save(&self, bytes: &[u8], suggested_base: &str, kind: ImageKind) -> Result<String> {
        let base = sanitize_base_name(suggested_base);
        let mut temp = self.temp_file_with(bytes)?;
        let mut taken = self.stems()?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let stem = disambiguated_stem(&base, attempt);
            if taken.contains(&stem) {
                continue;
            }

            let name = format!("{stem}.{}", kind.extension());
            match temp.persist_noclobber(self.path_of(&name)) {
                Ok(_) => {
                    tracing::info!(target: TARGET, name = %name, size = bytes.len(), "stored canonical asset");
                    return Ok(name);
                }
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                    // Another writer claimed it between the scan and the rename.
                    temp = err.file;
                    taken = self.stems()?;
                }
                Err(err) => {
                    tracing::error!(target: TARGET, name = %name, error = %err.error, "cannot store asset");
                    return Err(IconError::write(&name, err.error));
                }
            }
        }

        Err(IconError::WriteFailed(format!(
            "no free name for base '{base}'"
        )))
    }

    /// Store bytes under exactly `stem`, replacing any existing file of that
    /// name. Used for deterministic names such as materialized catalog icons.
    pub fn save_as(&self, bytes: &[u8], stem: &str, kind: ImageKind) -> Result<String> {
        let name = format!("{stem}.{}", kind.extension());
        self.write(&name, bytes)?;
        tracing::info!(target: TARGET, name = %name, size = bytes.len(), "stored canonical asset");
        Ok(name)
    }

    /// Write derived variants, replacing previous files of the same names.
    ///
    /// Variants that belong together, such as a grayscale pair, go in one
    /// call: every file is staged before any is renamed into place, and if a
    /// rename fails the files already placed by this call are removed again.
    pub fn write_derived(&self, files: &[(String, Vec<u8>)]) -> Result<()> {
        for (name, _) in files {
            if !has_transform_suffix(name) || !is_valid_name(name) {
                return Err(IconError::InvalidInput(format!(
                    "'{name}' is not a derived asset name"
                )));
            }
        }

        let mut staged = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            staged.push((name, self.temp_file_with(bytes)?));
        }

        let mut placed: Vec<&str> = Vec::with_capacity(staged.len());
        for (name, temp) in staged {
            if let Err(err) = temp.persist(self.path_of(name)) {
                tracing::error!(target: TARGET, name = %name, error = %err.error, "cannot store asset");
                for done in &placed {
                    if let Err(e) = fs::remove_file(self.path_of(done)) {
                        tracing::warn!(target: TARGET, name = %done, error = %e, "cannot remove partial variant");
                    }
                }
                return Err(IconError::write(name, err.error));
            }
            placed.push(name);
        }

        tracing::debug!(target: TARGET, files = ?placed, "stored derived assets");
        Ok(())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if !is_valid_name(name) {
            return Err(IconError::InvalidInput(format!("invalid asset name '{name}'")));
        }
        let temp = self.temp_file_with(bytes)?;
        temp.persist(self.path_of(name)).map_err(|err| {
            tracing::error!(target: TARGET, name = %name, error = %err.error, "cannot store asset");
            IconError::write(name, err.error)
        })?;
        Ok(())
    }

    fn temp_file_with(&self, bytes: &[u8]) -> Result<tempfile::NamedTempFile> {
        let write_err = |e: io::Error| {
            tracing::error!(target: TARGET, path = %self.root.display(), error = %e, "cannot write temporary file");
            IconError::write(self.root.display(), e)
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".iconvault-")
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(write_err)?;
        temp.write_all(bytes).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        Ok(temp)
    }

    /// Read an asset's bytes.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        if !is_valid_name(name) {
            return Err(IconError::NotFound(format!("invalid asset name '{name}'")));
        }
        fs::read(self.path_of(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::IsADirectory => {
                IconError::NotFound(format!("asset '{name}' does not exist"))
            }
            _ => {
                tracing::error!(target: TARGET, name = %name, error = %e, "cannot read asset");
                IconError::write(name, e)
            }
        })
    }

    /// Whether an asset file exists.
    pub fn exists(&self, name: &str) -> bool {
        is_valid_name(name) && self.path_of(name).is_file()
    }

    /// The stored file whose stem is exactly `stem`, if any.
    pub fn find_by_stem(&self, stem: &str) -> Result<Option<String>> {
        Ok(self
            .file_names()?
            .into_iter()
            .filter(|name| split_extension(name).0 == stem)
            .min())
    }

    /// The canonical asset of `name` (itself, if it is not derived).
    pub fn original_of(&self, name: &str) -> Result<String> {
        if !is_valid_name(name) {
            return Err(IconError::NotFound(format!("invalid asset name '{name}'")));
        }
        let base = strip_transform_suffix(name);
        if self.exists(&base) {
            return Ok(base);
        }
        self.find_by_stem(split_extension(&base).0)?.ok_or_else(|| {
            IconError::NotFound(format!("original of '{name}' does not exist"))
        })
    }

    /// Read an asset for display.
    ///
    /// `path` is a `favicon:` reference or a bare file name. A mode-free
    /// grayscale name resolves to the black variant for light themes and the
    /// white variant for dark ones.
    pub fn serve(&self, path: &str, theme: Theme) -> Result<ServedAsset> {
        let name = match IconReference::parse(path) {
            IconReference::Local(name) | IconReference::LibraryComponent(name) => name,
            _ => return Err(IconError::NotFound(format!("'{path}' is not a stored asset"))),
        };

        let name = match split_extension(&name) {
            (stem, ext) if stem.ends_with("_grayscale") => {
                let suffix = Variant::grayscale_for(theme).suffix();
                let base = &stem[..stem.len() - "_grayscale".len()];
                match ext {
                    Some(ext) => format!("{base}{suffix}.{ext}"),
                    None => format!("{base}{suffix}"),
                }
            }
            _ => name,
        };

        let bytes = self.read(&name)?;
        let content_type = split_extension(&name)
            .1
            .and_then(ImageKind::from_extension)
            .or_else(|| ImageKind::sniff(&bytes))
            .map(ImageKind::mime_type)
            .unwrap_or("application/octet-stream");

        tracing::debug!(target: TARGET, name = %name, ?theme, "serving asset");
        Ok(ServedAsset {
            name,
            bytes,
            content_type,
        })
    }

    /// Names of every visible asset file.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| IconError::write(self.root.display(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IconError::write(self.root.display(), e))?;
            if let Some(name) = entry.file_name().to_str()
                && is_valid_name(name)
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn stems(&self) -> Result<HashSet<String>> {
        Ok(self
            .file_names()?
            .iter()
            .map(|name| split_extension(name).0.to_string())
            .collect())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Dark => "dark",
        })
    }
}
