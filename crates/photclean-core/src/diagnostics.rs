use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::schema::PhotometryTable;
use crate::sentinel::Band;

/// Operator-facing event raised by a cleansing stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    NightNullified {
        night: i64,
        band: Band,
        ratio: f64,
        rows: usize,
    },
    ExposureNullified {
        timestamp: f64,
        band: Band,
        ratio: f64,
        rows: usize,
    },
    StarsScrubbed {
        band: Band,
        stars: usize,
        points: usize,
    },
    /// A ratio was NaN, so its night or exposure was left alone.
    RatioNotANumber { key: String, band: Band },
    /// A lookup star had no points at all in the band and was skipped.
    DegenerateFlagCounts { source_id: i64, band: Band },
}

impl Diagnostic {
    pub fn band(&self) -> Band {
        match self {
            Diagnostic::NightNullified { band, .. }
            | Diagnostic::ExposureNullified { band, .. }
            | Diagnostic::StarsScrubbed { band, .. }
            | Diagnostic::RatioNotANumber { band, .. }
            | Diagnostic::DegenerateFlagCounts { band, .. } => *band,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::RatioNotANumber { .. } | Diagnostic::DegenerateFlagCounts { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NightNullified {
                night, band, ratio, ..
            } => write!(f, "nullified night {night} {band} band (quality: {ratio:.2})"),
            Diagnostic::ExposureNullified {
                timestamp,
                band,
                ratio,
                ..
            } => write!(
                f,
                "nullified timestamp {timestamp:.6} {band} band (quality: {ratio:.2})"
            ),
            Diagnostic::StarsScrubbed { band, stars, .. } => {
                write!(f, "scrubbed {stars} sources at {band} band")
            }
            Diagnostic::RatioNotANumber { key, band } => {
                write!(f, "quality ratio for {key} {band} band is NaN; left untouched")
            }
            Diagnostic::DegenerateFlagCounts { source_id, band } => write!(
                f,
                "source {source_id} has no {band} band points in the flag lookup; skipped"
            ),
        }
    }
}

/// Logs `diagnostic` and keeps it for the caller.
pub(crate) fn record(diagnostics: &mut Vec<Diagnostic>, stage: &'static str, diagnostic: Diagnostic) {
    let band = diagnostic.band();
    if diagnostic.is_warning() {
        warn!(stage, band = %band, "{diagnostic}");
    } else {
        info!(stage, band = %band, "{diagnostic}");
    }
    diagnostics.push(diagnostic);
}

/// The independent table produced by a stage, with what the stage reported.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub table: PhotometryTable,
    pub diagnostics: Vec<Diagnostic>,
}
