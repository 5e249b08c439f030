use polars::prelude::*;
use tracing::debug;

use crate::diagnostics::StageOutcome;
use crate::error::{CleanseError, Result};
use crate::ratios::count_selected;
use crate::schema::PhotometryTable;
use crate::sentinel::SentinelPolicy;

pub const DEFAULT_DUST_THRESHOLD: f64 = 0.5;

const STAGE: &str = "dust";

pub(crate) fn check_dust_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(CleanseError::InvalidThreshold {
            stage: STAGE,
            threshold,
            reason: "must be finite and non-negative",
        });
    }
    Ok(())
}

/// Nullifies every magnitude whose uncertainty is strictly greater than `threshold`.
/// A NaN uncertainty is not treated as exceeding it.
pub fn dust_error_bars(
    table: &PhotometryTable,
    threshold: f64,
    policy: &SentinelPolicy,
) -> Result<StageOutcome> {
    check_dust_threshold(threshold)?;
    policy.validate()?;

    let mut output = table.clone();

    for &band in &policy.bands {
        let mask: BooleanChunked = table
            .errors(band)?
            .into_no_null_iter()
            .map(|error| error > threshold)
            .collect();
        let dusted = count_selected(&mask);
        if dusted > 0 {
            output.nullify(band, &mask, policy.null)?;
        }
        debug!(stage = STAGE, band = %band, dusted, "dusted large error bars");
    }

    output.ensure_rows_preserved(table, STAGE)?;

    Ok(StageOutcome {
        table: output,
        diagnostics: Vec::new(),
    })
}
