//! JSON run configuration.

use crate::{Compositor, LabelStyle};
use ar_overlay_aruco::{
    DetectorError, Dictionary, DictionaryError, DictionaryKind, QuadDetector, QuadDetectorParams,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("codebook holds {found}, but the configuration asks for {expected}")]
    DictionaryMismatch {
        expected: DictionaryKind,
        found: DictionaryKind,
    },
}

/// Dictionary chosen by bit-grid size and population (e.g. 6 and 250 for
/// `DICT_6X6_250`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionarySelection {
    pub marker_size: usize,
    pub total_markers: usize,
}

impl Default for DictionarySelection {
    fn default() -> Self {
        Self {
            marker_size: 6,
            total_markers: 250,
        }
    }
}

impl DictionarySelection {
    pub fn kind(&self) -> Result<DictionaryKind, DictionaryError> {
        DictionaryKind::from_params(self.marker_size, self.total_markers)
    }
}

fn default_true() -> bool {
    true
}

fn default_wait_ms() -> u64 {
    1
}

/// Everything a run needs: where frames, assets and the codebook live,
/// where results go, and how to detect and draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub frames_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub codebook_path: PathBuf,
    #[serde(default)]
    pub dictionary: DictionarySelection,
    /// Without an output directory frames are processed and dropped.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub loop_frames: bool,
    /// Outline every detection before compositing.
    #[serde(default = "default_true")]
    pub draw_outlines: bool,
    /// Write each composited marker's id at its top-left corner.
    #[serde(default = "default_true")]
    pub draw_ids: bool,
    #[serde(default)]
    pub label: LabelStyle,
    /// Pause after each frame, in milliseconds.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    #[serde(default)]
    pub detector: QuadDetectorParams,
}

impl OverlayConfig {
    pub fn new(
        frames_dir: impl Into<PathBuf>,
        assets_dir: impl Into<PathBuf>,
        codebook_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            frames_dir: frames_dir.into(),
            assets_dir: assets_dir.into(),
            codebook_path: codebook_path.into(),
            dictionary: DictionarySelection::default(),
            output_dir: None,
            loop_frames: false,
            draw_outlines: true,
            draw_ids: true,
            label: LabelStyle::default(),
            wait_ms: default_wait_ms(),
            detector: QuadDetectorParams::default(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load the codebook and check it is the configured dictionary.
    pub fn load_dictionary(&self) -> Result<Dictionary, ConfigError> {
        let expected = self.dictionary.kind()?;
        let dict = Dictionary::load_json(&self.codebook_path)?;
        if dict.kind() != expected {
            return Err(ConfigError::DictionaryMismatch {
                expected,
                found: dict.kind(),
            });
        }
        Ok(dict)
    }

    pub fn build_detector(&self) -> Result<QuadDetector, ConfigError> {
        let dict = self.load_dictionary()?;
        Ok(QuadDetector::new(dict, self.detector.clone())?)
    }

    pub fn compositor(&self) -> Compositor {
        Compositor::new(self.draw_ids.then_some(self.label))
    }
}
