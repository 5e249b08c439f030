use tracing::debug;

use crate::diagnostics::{record, Diagnostic, StageOutcome};
use crate::error::Result;
use crate::ratios::{check_ratio_threshold, fails_threshold, ExposureRatios};
use crate::schema::PhotometryTable;
use crate::sentinel::{SentinelPolicy, UNGRADED};

pub const DEFAULT_EXPOSURE_THRESHOLD: f64 = 0.9;

const STAGE: &str = "exposures";

/// Grades every record with the quality ratio of its exposure and nullifies the bands whose
/// exposure ratio is strictly below `threshold`.
///
/// Grade columns are rebuilt from scratch on every call: records whose timestamp matches
/// no entry of `ratios` (or whose ratio is NaN) carry [`UNGRADED`]. A nullified record keeps
/// the grade that caused it.
pub fn cleanse_and_grade_exposures(
    table: &PhotometryTable,
    ratios: &ExposureRatios,
    threshold: f64,
    policy: &SentinelPolicy,
) -> Result<StageOutcome> {
    check_ratio_threshold(STAGE, threshold)?;
    policy.validate()?;

    let index = ratios.index_rows(table.timestamps()?.into_no_null_iter());
    let mut output = table.clone();
    let mut diagnostics = Vec::new();

    for &band in &policy.bands {
        let band_ratios = ratios.ratios(band);

        let grades = index
            .row_keys()
            .iter()
            .map(|pos| match pos {
                Some(pos) if !band_ratios[*pos].is_nan() => band_ratios[*pos],
                _ => UNGRADED,
            })
            .collect();
        output.replace_grades(band, grades)?;

        let mut selected = vec![false; ratios.len()];
        for (pos, (&timestamp, &ratio)) in ratios.keys().iter().zip(band_ratios).enumerate() {
            if ratio.is_nan() {
                record(
                    &mut diagnostics,
                    STAGE,
                    Diagnostic::RatioNotANumber {
                        key: format!("timestamp {timestamp}"),
                        band,
                    },
                );
            } else if fails_threshold(ratio, threshold) {
                selected[pos] = true;
                record(
                    &mut diagnostics,
                    STAGE,
                    Diagnostic::ExposureNullified {
                        timestamp,
                        band,
                        ratio,
                        rows: index.rows(pos),
                    },
                );
            }
        }

        if selected.contains(&true) {
            output.nullify(band, &index.mask_for(&selected), policy.null)?;
        }
    }

    output.ensure_rows_preserved(table, STAGE)?;
    debug!(
        stage = STAGE,
        rows = output.height(),
        exposures = ratios.len(),
        "exposure grading finished"
    );

    Ok(StageOutcome {
        table: output,
        diagnostics,
    })
}
