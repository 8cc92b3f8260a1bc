//! Replacement images keyed by marker id.
//!
//! An asset directory holds one image per marker, named `<id>.<ext>`
//! (`7.png`, `12.jpg`). Anything else in the directory is skipped and
//! reported, never fatal.

use crate::MarkerId;
use image::RgbImage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("cannot read asset directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A directory entry that did not become an asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedAsset {
    pub path: PathBuf,
    pub reason: String,
}

/// Immutable-after-load map from marker id to its replacement image.
#[derive(Clone, Debug, Default)]
pub struct AssetLibrary {
    images: BTreeMap<MarkerId, RgbImage>,
    skipped: Vec<SkippedAsset>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the image for `id`, returning the previous one.
    pub fn insert(&mut self, id: MarkerId, image: RgbImage) -> Option<RgbImage> {
        self.images.insert(id, image)
    }

    #[inline]
    pub fn get(&self, id: MarkerId) -> Option<&RgbImage> {
        self.images.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Known ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.images.keys().copied()
    }

    pub fn skipped(&self) -> &[SkippedAsset] {
        &self.skipped
    }
}

impl FromIterator<(MarkerId, RgbImage)> for AssetLibrary {
    fn from_iter<I: IntoIterator<Item = (MarkerId, RgbImage)>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
            skipped: Vec::new(),
        }
    }
}

/// Load every `<id>.<ext>` image in `dir`.
///
/// Entries are visited in file-name order, so when two files share an id
/// (`7.jpg`, `7.png`) the later name wins. Fails only when `dir` itself cannot
/// be listed.
pub fn load_assets(dir: impl AsRef<Path>) -> Result<AssetLibrary, AssetError> {
    let dir = dir.as_ref();
    let read_dir_err = |source| AssetError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_err)? {
        paths.push(entry.map_err(read_dir_err)?.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut lib = AssetLibrary::new();
    for path in paths {
        match load_one(&path) {
            Ok((id, image)) => {
                if lib.insert(id, image).is_some() {
                    log::warn!("marker {id}: {} replaces an earlier asset", path.display());
                }
            }
            Err(reason) => {
                log::warn!("skipping {}: {reason}", path.display());
                lib.skipped.push(SkippedAsset { path, reason });
            }
        }
    }

    log::info!(
        "loaded {} marker assets from {} ({} skipped)",
        lib.len(),
        dir.display(),
        lib.skipped.len()
    );
    Ok(lib)
}

fn load_one(path: &Path) -> Result<(MarkerId, RgbImage), String> {
    if !path.is_file() {
        return Err("not a regular file".to_string());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;
    let id: MarkerId = stem
        .parse()
        .map_err(|_| format!("file stem {stem:?} is not a marker id"))?;
    let image = image::open(path).map_err(|e| format!("cannot decode image: {e}"))?;
    Ok((id, image.to_rgb8()))
}
