use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use crate::diagnostics::{record, Diagnostic, StageOutcome};
use crate::error::{CleanseError, Result};
use crate::ratios::{check_ratio_threshold, count_selected};
use crate::schema::{int_values, PhotometryTable, SOURCE_ID};
use crate::sentinel::{Band, SentinelPolicy};

pub const DEFAULT_FLAG_THRESHOLD: f64 = 0.1;

const STAGE: &str = "flag_scrub";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagCounts {
    pub flagged: u64,
    pub unflagged: u64,
}

impl FlagCounts {
    pub fn new(flagged: u64, unflagged: u64) -> Self {
        Self { flagged, unflagged }
    }

    /// `None` when the two counts overflow a `u64`.
    pub fn total(&self) -> Option<u64> {
        self.flagged.checked_add(self.unflagged)
    }

    /// Fraction of flagged points, or `None` when the star has no points in the band or
    /// the counts overflow.
    pub fn flagged_ratio(&self) -> Option<f64> {
        match self.total()? {
            0 => None,
            total => Some(self.flagged as f64 / total as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagLookupRow {
    pub source_id: i64,
    pub j: FlagCounts,
    pub h: FlagCounts,
    pub k: FlagCounts,
}

impl FlagLookupRow {
    pub fn counts(&self, band: Band) -> FlagCounts {
        match band {
            Band::J => self.j,
            Band::H => self.h,
            Band::K => self.k,
        }
    }
}

/// Per-star flag statistics for the stars a caller wants scrubbed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlagLookup {
    rows: Vec<FlagLookupRow>,
}

impl FlagLookup {
    pub fn new(rows: Vec<FlagLookupRow>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if row.source_id <= 0 {
                return Err(CleanseError::InvalidSourceId {
                    source_id: row.source_id,
                });
            }
            for band in Band::ALL {
                if row.counts(band).total().is_none() {
                    return Err(CleanseError::CountOverflow {
                        source_id: row.source_id,
                        band: band.as_str(),
                    });
                }
            }
            if !seen.insert(row.source_id) {
                return Err(CleanseError::DuplicateKey {
                    kind: "source",
                    key: row.source_id.to_string(),
                });
            }
        }
        Ok(Self { rows })
    }

    /// Reads `SOURCEID` with `N_{b}_info` / `N_{b}_noflag` counts for each band.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let source_ids = int_values(df, SOURCE_ID)?;

        let mut counts = Vec::with_capacity(Band::ALL.len());
        for band in Band::ALL {
            let flagged = read_counts(df, band.flagged_count_column(), &source_ids)?;
            let unflagged = read_counts(df, band.unflagged_count_column(), &source_ids)?;
            counts.push((flagged, unflagged));
        }

        let band_counts = |band: Band, row: usize| {
            let (flagged, unflagged) = &counts[band.index()];
            FlagCounts::new(flagged[row], unflagged[row])
        };

        let rows = source_ids
            .iter()
            .enumerate()
            .map(|(row, &source_id)| FlagLookupRow {
                source_id,
                j: band_counts(Band::J, row),
                h: band_counts(Band::H, row),
                k: band_counts(Band::K, row),
            })
            .collect();

        Self::new(rows)
    }

    pub fn rows(&self) -> &[FlagLookupRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn read_counts(df: &DataFrame, column: &str, source_ids: &[i64]) -> Result<Vec<u64>> {
    int_values(df, column)?
        .into_iter()
        .zip(source_ids)
        .map(|(count, &source_id)| {
            u64::try_from(count).map_err(|_| CleanseError::NegativeCount {
                column: column.to_string(),
                source_id,
                count,
            })
        })
        .collect()
}

/// Scrubs flagged points from stars whose flagged fraction lies strictly between 0 and
/// `threshold`. Stars above the threshold, and stars not in `lookup`, keep every point.
///
/// Stars with no points at all in a band are skipped for that band and reported.
pub fn scrub_flagged_points(
    table: &PhotometryTable,
    lookup: &FlagLookup,
    threshold: f64,
    policy: &SentinelPolicy,
) -> Result<StageOutcome> {
    check_ratio_threshold(STAGE, threshold)?;
    policy.validate()?;

    let source_ids = table.source_ids()?;
    let mut output = table.clone();
    let mut diagnostics = Vec::new();

    for &band in &policy.bands {
        let mut qualified: HashSet<i64> = HashSet::new();
        for row in lookup.rows() {
            match row.counts(band).flagged_ratio() {
                None => record(
                    &mut diagnostics,
                    STAGE,
                    Diagnostic::DegenerateFlagCounts {
                        source_id: row.source_id,
                        band,
                    },
                ),
                Some(ratio) if ratio > 0.0 && ratio < threshold => {
                    qualified.insert(row.source_id);
                }
                Some(_) => {}
            }
        }

        let mut points = 0;
        if !qualified.is_empty() {
            let members: BooleanChunked = source_ids
                .into_no_null_iter()
                .map(|source_id| qualified.contains(&source_id))
                .collect();
            let flagged = table.flags(band)?.not_equal(0);
            let mask = &members & &flagged;
            points = count_selected(&mask);
            output.nullify(band, &mask, policy.null)?;
        }

        record(
            &mut diagnostics,
            STAGE,
            Diagnostic::StarsScrubbed {
                band,
                stars: qualified.len(),
                points,
            },
        );
    }

    output.ensure_rows_preserved(table, STAGE)?;
    debug!(stage = STAGE, lookup_rows = lookup.len(), "flag scrubbing finished");

    Ok(StageOutcome {
        table: output,
        diagnostics,
    })
}
