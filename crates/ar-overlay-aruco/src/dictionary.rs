//! Dictionary variants and codebook-backed code tables.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, sync::Arc};

#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error("no dictionary with {marker_size}x{marker_size} bits and {population} markers")]
    Unsupported { marker_size: usize, population: usize },
    #[error("unknown dictionary name {0:?}")]
    UnknownName(String),
    #[error("codebook {name} declares marker_size {got}, expected {expected}")]
    MarkerSizeMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("codebook {name} has {got} codes, expected {expected}")]
    WrongCodeCount {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("code for id {id} does not fit in {bits} bits")]
    CodeOutOfRange { id: usize, bits: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Supported dictionary variants: inner bit-grid size × number of markers.
///
/// Names follow the conventional `DICT_{N}X{N}_{COUNT}` spelling, which is
/// also the serialized form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DictionaryKind {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_4X4_250")]
    Dict4x4_250,
    #[serde(rename = "DICT_4X4_1000")]
    Dict4x4_1000,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "DICT_5X5_1000")]
    Dict5x5_1000,
    #[serde(rename = "DICT_6X6_50")]
    Dict6x6_50,
    #[serde(rename = "DICT_6X6_100")]
    Dict6x6_100,
    #[serde(rename = "DICT_6X6_250")]
    Dict6x6_250,
    #[serde(rename = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "DICT_7X7_50")]
    Dict7x7_50,
    #[serde(rename = "DICT_7X7_100")]
    Dict7x7_100,
    #[serde(rename = "DICT_7X7_250")]
    Dict7x7_250,
    #[serde(rename = "DICT_7X7_1000")]
    Dict7x7_1000,
}

struct KindInfo {
    kind: DictionaryKind,
    marker_size: usize,
    population: usize,
    name: &'static str,
}

const fn info(
    kind: DictionaryKind,
    marker_size: usize,
    population: usize,
    name: &'static str,
) -> KindInfo {
    KindInfo {
        kind,
        marker_size,
        population,
        name,
    }
}

// Indexed by discriminant.
const KINDS: [KindInfo; 16] = [
    info(DictionaryKind::Dict4x4_50, 4, 50, "DICT_4X4_50"),
    info(DictionaryKind::Dict4x4_100, 4, 100, "DICT_4X4_100"),
    info(DictionaryKind::Dict4x4_250, 4, 250, "DICT_4X4_250"),
    info(DictionaryKind::Dict4x4_1000, 4, 1000, "DICT_4X4_1000"),
    info(DictionaryKind::Dict5x5_50, 5, 50, "DICT_5X5_50"),
    info(DictionaryKind::Dict5x5_100, 5, 100, "DICT_5X5_100"),
    info(DictionaryKind::Dict5x5_250, 5, 250, "DICT_5X5_250"),
    info(DictionaryKind::Dict5x5_1000, 5, 1000, "DICT_5X5_1000"),
    info(DictionaryKind::Dict6x6_50, 6, 50, "DICT_6X6_50"),
    info(DictionaryKind::Dict6x6_100, 6, 100, "DICT_6X6_100"),
    info(DictionaryKind::Dict6x6_250, 6, 250, "DICT_6X6_250"),
    info(DictionaryKind::Dict6x6_1000, 6, 1000, "DICT_6X6_1000"),
    info(DictionaryKind::Dict7x7_50, 7, 50, "DICT_7X7_50"),
    info(DictionaryKind::Dict7x7_100, 7, 100, "DICT_7X7_100"),
    info(DictionaryKind::Dict7x7_250, 7, 250, "DICT_7X7_250"),
    info(DictionaryKind::Dict7x7_1000, 7, 1000, "DICT_7X7_1000"),
];

impl DictionaryKind {
    /// All variants, in table order.
    pub const ALL: [DictionaryKind; 16] = [
        DictionaryKind::Dict4x4_50,
        DictionaryKind::Dict4x4_100,
        DictionaryKind::Dict4x4_250,
        DictionaryKind::Dict4x4_1000,
        DictionaryKind::Dict5x5_50,
        DictionaryKind::Dict5x5_100,
        DictionaryKind::Dict5x5_250,
        DictionaryKind::Dict5x5_1000,
        DictionaryKind::Dict6x6_50,
        DictionaryKind::Dict6x6_100,
        DictionaryKind::Dict6x6_250,
        DictionaryKind::Dict6x6_1000,
        DictionaryKind::Dict7x7_50,
        DictionaryKind::Dict7x7_100,
        DictionaryKind::Dict7x7_250,
        DictionaryKind::Dict7x7_1000,
    ];

    #[inline]
    fn info(self) -> &'static KindInfo {
        &KINDS[self as usize]
    }

    /// Inner bits per side (e.g. 6 for a 6×6 marker).
    #[inline]
    pub fn marker_size(self) -> usize {
        self.info().marker_size
    }

    /// Number of markers in the dictionary.
    #[inline]
    pub fn population(self) -> usize {
        self.info().population
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Select the variant for a bit-grid size and dictionary population.
    pub fn from_params(marker_size: usize, population: usize) -> Result<Self, DictionaryError> {
        KINDS
            .iter()
            .find(|k| k.marker_size == marker_size && k.population == population)
            .map(|k| k.kind)
            .ok_or(DictionaryError::Unsupported {
                marker_size,
                population,
            })
    }

    pub fn from_name(name: &str) -> Result<Self, DictionaryError> {
        KINDS
            .iter()
            .find(|k| k.name.eq_ignore_ascii_case(name))
            .map(|k| k.kind)
            .ok_or_else(|| DictionaryError::UnknownName(name.to_string()))
    }
}

impl std::fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// On-disk codebook: one packed code per marker id.
///
/// Bits are row-major over the inner `marker_size × marker_size` grid, bit
/// index `y * marker_size + x`, with **black = 1**.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Codebook {
    pub name: String,
    pub marker_size: usize,
    #[serde(default)]
    pub max_correction_bits: u8,
    pub codes: Vec<u64>,
}

/// A validated dictionary: variant, correction capacity and code table.
#[derive(Clone, Debug)]
pub struct Dictionary {
    kind: DictionaryKind,
    max_correction_bits: u8,
    codes: Arc<[u64]>,
}

impl Dictionary {
    /// Build a dictionary, checking the code count and bit width against `kind`.
    pub fn new(
        kind: DictionaryKind,
        max_correction_bits: u8,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        if codes.len() != kind.population() {
            return Err(DictionaryError::WrongCodeCount {
                name: kind.name(),
                expected: kind.population(),
                got: codes.len(),
            });
        }

        let bits = kind.marker_size() * kind.marker_size();
        if bits < 64 {
            if let Some(id) = codes.iter().position(|&c| c >> bits != 0) {
                return Err(DictionaryError::CodeOutOfRange { id, bits });
            }
        }

        Ok(Self {
            kind,
            max_correction_bits,
            codes: codes.into(),
        })
    }

    pub fn from_codebook(codebook: Codebook) -> Result<Self, DictionaryError> {
        let kind = DictionaryKind::from_name(&codebook.name)?;
        if codebook.marker_size != kind.marker_size() {
            return Err(DictionaryError::MarkerSizeMismatch {
                name: kind.name(),
                expected: kind.marker_size(),
                got: codebook.marker_size,
            });
        }
        Self::new(kind, codebook.max_correction_bits, codebook.codes)
    }

    /// Load and validate a JSON codebook.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let raw = fs::read_to_string(path)?;
        let codebook: Codebook = serde_json::from_str(&raw)?;
        Self::from_codebook(codebook)
    }

    pub fn to_codebook(&self) -> Codebook {
        Codebook {
            name: self.kind.name().to_string(),
            marker_size: self.kind.marker_size(),
            max_correction_bits: self.max_correction_bits,
            codes: self.codes.to_vec(),
        }
    }

    /// Write this dictionary as a pretty JSON codebook.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DictionaryError> {
        let json = serde_json::to_string_pretty(&self.to_codebook())?;
        fs::write(path, json)?;
        Ok(())
    }

    #[inline]
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    #[inline]
    pub fn marker_size(&self) -> usize {
        self.kind.marker_size()
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size() * self.marker_size()
    }

    #[inline]
    pub fn max_correction_bits(&self) -> u8 {
        self.max_correction_bits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[inline]
    pub fn codes(&self) -> &[u64] {
        &self.codes
    }

    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }
}
