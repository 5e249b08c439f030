use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CleanseError, Result};

/// WSA null value written into discarded magnitudes.
pub const NULL_SENTINEL: f64 = -9.99999488e+08;

/// Grade carried by records that never matched a known exposure.
pub const UNGRADED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    #[serde(alias = "j")]
    J,
    #[serde(alias = "h")]
    H,
    #[serde(alias = "k")]
    K,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::J, Band::H, Band::K];

    pub fn as_str(self) -> &'static str {
        match self {
            Band::J => "J",
            Band::H => "H",
            Band::K => "K",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Band::J => 0,
            Band::H => 1,
            Band::K => 2,
        }
    }

    pub fn magnitude_column(self) -> &'static str {
        match self {
            Band::J => "JAPERMAG3",
            Band::H => "HAPERMAG3",
            Band::K => "KAPERMAG3",
        }
    }

    pub fn error_column(self) -> &'static str {
        match self {
            Band::J => "JAPERMAG3ERR",
            Band::H => "HAPERMAG3ERR",
            Band::K => "KAPERMAG3ERR",
        }
    }

    pub fn flag_column(self) -> &'static str {
        match self {
            Band::J => "JPPERRBITS",
            Band::H => "HPPERRBITS",
            Band::K => "KPPERRBITS",
        }
    }

    pub fn grade_column(self) -> &'static str {
        match self {
            Band::J => "JGRADE",
            Band::H => "HGRADE",
            Band::K => "KGRADE",
        }
    }

    pub fn ratio_column(self) -> &'static str {
        match self {
            Band::J => "J_RATIO",
            Band::H => "H_RATIO",
            Band::K => "K_RATIO",
        }
    }

    /// Lookup column holding the count of flagged points.
    pub fn flagged_count_column(self) -> &'static str {
        match self {
            Band::J => "N_j_info",
            Band::H => "N_h_info",
            Band::K => "N_k_info",
        }
    }

    /// Lookup column holding the count of unflagged points.
    pub fn unflagged_count_column(self) -> &'static str {
        match self {
            Band::J => "N_j_noflag",
            Band::H => "N_h_noflag",
            Band::K => "N_k_noflag",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The null value and band set every stage is parameterised with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelPolicy {
    pub null: f64,
    pub bands: Vec<Band>,
}

impl Default for SentinelPolicy {
    fn default() -> Self {
        Self {
            null: NULL_SENTINEL,
            bands: Band::ALL.to_vec(),
        }
    }
}

impl SentinelPolicy {
    pub fn new(null: f64, bands: Vec<Band>) -> Result<Self> {
        let policy = Self { null, bands };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.null.is_finite() {
            return Err(CleanseError::InvalidPolicy(format!(
                "null sentinel {} must be finite",
                self.null
            )));
        }
        if self.bands.is_empty() {
            return Err(CleanseError::InvalidPolicy(
                "band set must not be empty".to_string(),
            ));
        }
        let mut seen = [false; 3];
        for band in &self.bands {
            if std::mem::replace(&mut seen[band.index()], true) {
                return Err(CleanseError::InvalidPolicy(format!(
                    "band {band} listed more than once"
                )));
            }
        }
        Ok(())
    }

    pub fn is_null(&self, magnitude: f64) -> bool {
        magnitude == self.null
    }
}
