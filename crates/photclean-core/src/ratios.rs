use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use polars::prelude::*;

use crate::error::{CleanseError, Result};
use crate::schema::{int_values, required_column};
use crate::sentinel::Band;

pub const NIGHT_KEY: &str = "NIGHT";
pub const EXPOSURE_KEY: &str = crate::schema::TIMESTAMP;

/// True when `ratio` should trigger nullification. NaN never does.
pub fn fails_threshold(ratio: f64, threshold: f64) -> bool {
    !ratio.is_nan() && ratio < threshold
}

pub(crate) fn check_ratio_threshold(stage: &'static str, threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CleanseError::InvalidThreshold {
            stage,
            threshold,
            reason: "must lie in [0, 1]",
        });
    }
    Ok(())
}

/// A value that can key a quality-ratio array: a night or an exact exposure timestamp.
pub trait RatioKey: Copy + fmt::Display {
    const KIND: &'static str;
    type Identity: Eq + Hash;

    fn identity(self) -> Self::Identity;
    fn is_valid(self) -> bool;
    fn read_keys(df: &DataFrame, column: &str) -> Result<Vec<Self>>;
}

impl RatioKey for i64 {
    const KIND: &'static str = "night";
    type Identity = i64;

    fn identity(self) -> i64 {
        self
    }

    fn is_valid(self) -> bool {
        true
    }

    fn read_keys(df: &DataFrame, column: &str) -> Result<Vec<Self>> {
        int_values(df, column)
    }
}

impl RatioKey for f64 {
    const KIND: &'static str = "exposure";
    type Identity = u64;

    // Bit identity, with -0.0 folded onto 0.0 so lookups agree with `==`.
    fn identity(self) -> u64 {
        if self == 0.0 {
            0.0f64.to_bits()
        } else {
            self.to_bits()
        }
    }

    fn is_valid(self) -> bool {
        self.is_finite()
    }

    fn read_keys(df: &DataFrame, column: &str) -> Result<Vec<Self>> {
        let values = required_column(df, column)?.cast(&DataType::Float64)?;
        let ca = values.f64()?;
        if ca.null_count() > 0 {
            return Err(CleanseError::NullValues {
                column: column.to_string(),
                count: ca.null_count(),
            });
        }
        Ok(ca.into_no_null_iter().collect())
    }
}

/// Per-band quality ratios positionally aligned to a list of distinct keys.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityRatios<K> {
    keys: Vec<K>,
    ratios: [Vec<f64>; 3],
}

pub type NightRatios = QualityRatios<i64>;
pub type ExposureRatios = QualityRatios<f64>;

impl<K: RatioKey> QualityRatios<K> {
    pub fn new(keys: Vec<K>, j: Vec<f64>, h: Vec<f64>, k: Vec<f64>) -> Result<Self> {
        let ratios = [j, h, k];

        for band in Band::ALL {
            let values = &ratios[band.index()];
            if values.len() != keys.len() {
                return Err(CleanseError::LengthMismatch {
                    column: band.ratio_column().to_string(),
                    expected: keys.len(),
                    found: values.len(),
                });
            }
        }

        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !key.is_valid() {
                return Err(CleanseError::InvalidKey {
                    kind: K::KIND,
                    key: key.to_string(),
                });
            }
            if !seen.insert(key.identity()) {
                return Err(CleanseError::DuplicateKey {
                    kind: K::KIND,
                    key: key.to_string(),
                });
            }
        }

        for band in Band::ALL {
            for (key, &ratio) in keys.iter().zip(&ratios[band.index()]) {
                if !ratio.is_nan() && !(0.0..=1.0).contains(&ratio) {
                    return Err(CleanseError::RatioOutOfRange {
                        column: band.ratio_column().to_string(),
                        key: key.to_string(),
                        ratio,
                    });
                }
            }
        }

        Ok(Self { keys, ratios })
    }

    /// Reads `key_column` plus `J_RATIO`, `H_RATIO`, `K_RATIO`. Null ratios read as NaN.
    pub fn from_frame(df: &DataFrame, key_column: &str) -> Result<Self> {
        let keys = K::read_keys(df, key_column)?;
        let read_ratios = |band: Band| -> Result<Vec<f64>> {
            let column = required_column(df, band.ratio_column())?.cast(&DataType::Float64)?;
            Ok(column
                .f64()?
                .into_iter()
                .map(|ratio| ratio.unwrap_or(f64::NAN))
                .collect())
        };
        Self::new(
            keys,
            read_ratios(Band::J)?,
            read_ratios(Band::H)?,
            read_ratios(Band::K)?,
        )
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn ratios(&self, band: Band) -> &[f64] {
        &self.ratios[band.index()]
    }

    /// Maps every table row onto the position of its key, in a single pass.
    pub(crate) fn index_rows<I>(&self, row_keys: I) -> KeyIndex
    where
        I: IntoIterator<Item = K>,
    {
        let positions: HashMap<K::Identity, usize> = self
            .keys
            .iter()
            .enumerate()
            .map(|(pos, key)| (key.identity(), pos))
            .collect();

        let mut rows_per_key = vec![0usize; self.keys.len()];
        let row_keys = row_keys
            .into_iter()
            .map(|key| {
                let pos = positions.get(&key.identity()).copied();
                if let Some(pos) = pos {
                    rows_per_key[pos] += 1;
                }
                pos
            })
            .collect();

        KeyIndex {
            row_keys,
            rows_per_key,
        }
    }
}

/// Row → key position map computed once per stage call.
pub(crate) struct KeyIndex {
    row_keys: Vec<Option<usize>>,
    rows_per_key: Vec<usize>,
}

impl KeyIndex {
    pub(crate) fn row_keys(&self) -> &[Option<usize>] {
        &self.row_keys
    }

    pub(crate) fn rows(&self, pos: usize) -> usize {
        self.rows_per_key[pos]
    }

    /// Mask of rows whose key position is marked in `selected`.
    pub(crate) fn mask_for(&self, selected: &[bool]) -> BooleanChunked {
        self.row_keys
            .iter()
            .map(|pos| pos.is_some_and(|pos| selected[pos]))
            .collect()
    }
}

pub(crate) fn count_selected(mask: &BooleanChunked) -> usize {
    mask.into_iter()
        .filter(|selected| matches!(selected, Some(true)))
        .count()
}
