use tracing::{debug, warn};

use crate::diagnostics::{record, Diagnostic, StageOutcome};
use crate::error::Result;
use crate::ratios::{check_ratio_threshold, fails_threshold, NightRatios};
use crate::schema::{night_of, PhotometryTable};
use crate::sentinel::SentinelPolicy;

pub const DEFAULT_NIGHT_THRESHOLD: f64 = 0.9;

const STAGE: &str = "nights";

/// Nullifies a band's magnitudes across every night whose quality ratio in that band is
/// strictly below `threshold`.
///
/// Nights missing from `ratios` are never touched, and each band is decided on its own.
/// Uncertainty, flag and grade columns pass through unchanged.
pub fn cleanse_nights(
    table: &PhotometryTable,
    ratios: &NightRatios,
    threshold: f64,
    policy: &SentinelPolicy,
) -> Result<StageOutcome> {
    check_ratio_threshold(STAGE, threshold)?;
    policy.validate()?;

    let index = ratios.index_rows(table.timestamps()?.into_no_null_iter().map(night_of));
    let mut output = table.clone();
    let mut diagnostics = Vec::new();

    for &band in &policy.bands {
        let mut selected = vec![false; ratios.len()];

        for (pos, (&night, &ratio)) in ratios.keys().iter().zip(ratios.ratios(band)).enumerate() {
            if ratio.is_nan() {
                record(
                    &mut diagnostics,
                    STAGE,
                    Diagnostic::RatioNotANumber {
                        key: format!("night {night}"),
                        band,
                    },
                );
            } else if fails_threshold(ratio, threshold) {
                selected[pos] = true;
                record(
                    &mut diagnostics,
                    STAGE,
                    Diagnostic::NightNullified {
                        night,
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
        events = diagnostics.len(),
        "night cleansing finished"
    );

    Ok(StageOutcome {
        table: output,
        diagnostics,
    })
}

/// Flag-based night cleansing: marks bad nights instead of nullifying them.
///
/// Deferred. The call validates its threshold and hands back an unchanged copy.
pub fn flag_nights(
    table: &PhotometryTable,
    _ratios: &NightRatios,
    threshold: f64,
) -> Result<StageOutcome> {
    check_ratio_threshold("flag_nights", threshold)?;
    warn!(
        stage = "flag_nights",
        "flag-based night cleansing is not implemented; table passed through unchanged"
    );
    Ok(StageOutcome {
        table: table.clone(),
        diagnostics: Vec::new(),
    })
}
