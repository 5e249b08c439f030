mod common;

use common::{errs, flag_bits, mags, obs, source_ids, table, H_MAG, J_MAG, K_MAG};
use photclean_core::diagnostics::Diagnostic;
use photclean_core::error::{CleanseError, Result};
use photclean_core::night_cleanser::{cleanse_nights, flag_nights, DEFAULT_NIGHT_THRESHOLD};
use photclean_core::ratios::NightRatios;
use photclean_core::sentinel::{Band, SentinelPolicy, NULL_SENTINEL};

fn two_night_rows() -> Vec<common::Obs> {
    vec![
        obs(1, 56000.11),
        obs(2, 56000.74),
        obs(0, 56000.30), // dropped before cleansing
        obs(1, 56001.20),
        obs(2, 56001.21).err(Band::J, 0.2).flags(Band::J, 16),
    ]
}

#[test]
fn bad_night_nullifies_only_that_band_on_that_night() -> Result<()> {
    let input = table(&two_night_rows());
    let ratios = NightRatios::new(
        vec![56000, 56001],
        vec![0.5, 0.95],
        vec![1.0, 1.0],
        vec![1.0, 1.0],
    )?;

    let outcome = cleanse_nights(
        &input,
        &ratios,
        DEFAULT_NIGHT_THRESHOLD,
        &SentinelPolicy::default(),
    )?;
    let output = &outcome.table;

    assert_eq!(output.height(), 4);
    assert_eq!(source_ids(output), vec![1, 2, 1, 2]);
    assert_eq!(
        mags(output, Band::J),
        vec![NULL_SENTINEL, NULL_SENTINEL, J_MAG, J_MAG]
    );
    assert_eq!(mags(output, Band::H), vec![H_MAG; 4]);
    assert_eq!(mags(output, Band::K), vec![K_MAG; 4]);

    assert_eq!(errs(output, Band::J), errs(&input, Band::J));
    assert_eq!(flag_bits(output, Band::J), flag_bits(&input, Band::J));
    assert!(output.grades(Band::J)?.is_none());

    assert_eq!(
        outcome.diagnostics,
        vec![Diagnostic::NightNullified {
            night: 56000,
            band: Band::J,
            ratio: 0.5,
            rows: 2,
        }]
    );
    assert_eq!(
        outcome.diagnostics[0].to_string(),
        "nullified night 56000 J band (quality: 0.50)"
    );
    Ok(())
}

#[test]
fn ratio_equal_to_threshold_is_kept() -> Result<()> {
    let input = table(&two_night_rows());
    let ratios = NightRatios::new(
        vec![56000, 56001],
        vec![0.9, 0.9],
        vec![0.9, 0.9],
        vec![0.9, 0.9],
    )?;

    let outcome = cleanse_nights(&input, &ratios, 0.9, &SentinelPolicy::default())?;

    for band in Band::ALL {
        assert_eq!(mags(&outcome.table, band), mags(&input, band));
    }
    assert!(outcome.diagnostics.is_empty());
    Ok(())
}

#[test]
fn nan_ratio_and_unlisted_night_leave_data_alone() -> Result<()> {
    let input = table(&[obs(1, 56000.1), obs(1, 56001.1), obs(1, 56002.1)]);
    let ratios = NightRatios::new(
        vec![56000, 56001],
        vec![f64::NAN, 0.1],
        vec![1.0, 1.0],
        vec![1.0, 1.0],
    )?;

    let outcome = cleanse_nights(&input, &ratios, 0.9, &SentinelPolicy::default())?;

    assert_eq!(
        mags(&outcome.table, Band::J),
        vec![J_MAG, NULL_SENTINEL, J_MAG]
    );
    assert!(matches!(
        outcome.diagnostics[0],
        Diagnostic::RatioNotANumber { band: Band::J, .. }
    ));
    assert!(matches!(
        outcome.diagnostics[1],
        Diagnostic::NightNullified {
            night: 56001,
            rows: 1,
            ..
        }
    ));
    Ok(())
}

#[test]
fn bands_outside_the_policy_are_not_touched() -> Result<()> {
    let input = table(&two_night_rows());
    let ratios = NightRatios::new(
        vec![56000, 56001],
        vec![0.0, 0.0],
        vec![0.0, 0.0],
        vec![0.0, 0.0],
    )?;
    let policy = SentinelPolicy::new(-99.0, vec![Band::H])?;

    let outcome = cleanse_nights(&input, &ratios, 0.9, &policy)?;

    assert_eq!(mags(&outcome.table, Band::H), vec![-99.0; 4]);
    assert_eq!(mags(&outcome.table, Band::J), vec![J_MAG; 4]);
    assert_eq!(mags(&outcome.table, Band::K), vec![K_MAG; 4]);
    assert_eq!(outcome.diagnostics.len(), 2);
    Ok(())
}

#[test]
fn caller_table_is_not_modified_and_nulls_stay_null() -> Result<()> {
    let input = table(&two_night_rows());
    let ratios = NightRatios::new(
        vec![56000, 56001],
        vec![0.5, 1.0],
        vec![1.0, 1.0],
        vec![1.0, 1.0],
    )?;
    let policy = SentinelPolicy::default();

    let first = cleanse_nights(&input, &ratios, 0.9, &policy)?;
    assert_eq!(mags(&input, Band::J), vec![J_MAG; 4]);

    // Repeating the stage is a no-op on the data but reports the night again.
    let second = cleanse_nights(&first.table, &ratios, 0.9, &policy)?;
    assert_eq!(mags(&second.table, Band::J), mags(&first.table, Band::J));
    assert_eq!(second.diagnostics, first.diagnostics);
    Ok(())
}

#[test]
fn invalid_threshold_is_rejected() {
    let input = table(&two_night_rows());
    let ratios = NightRatios::new(vec![56000], vec![0.5], vec![1.0], vec![1.0]).unwrap();

    let err = cleanse_nights(&input, &ratios, 1.5, &SentinelPolicy::default()).unwrap_err();
    assert!(matches!(
        err,
        CleanseError::InvalidThreshold { stage: "nights", .. }
    ));
}

#[test]
fn flag_based_night_cleansing_is_a_no_op() -> Result<()> {
    let input = table(&two_night_rows());
    let ratios = NightRatios::new(vec![56000], vec![0.0], vec![0.0], vec![0.0])?;

    let outcome = flag_nights(&input, &ratios, 0.9)?;

    assert_eq!(outcome.table.height(), input.height());
    for band in Band::ALL {
        assert_eq!(mags(&outcome.table, band), mags(&input, band));
    }
    assert!(outcome.diagnostics.is_empty());
    Ok(())
}
