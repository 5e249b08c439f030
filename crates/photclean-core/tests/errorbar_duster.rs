mod common;

use common::{errs, flag_bits, mags, obs, table, H_MAG, J_MAG, K_MAG};
use photclean_core::error::{CleanseError, Result};
use photclean_core::errorbar_duster::{dust_error_bars, DEFAULT_DUST_THRESHOLD};
use photclean_core::sentinel::{Band, SentinelPolicy, NULL_SENTINEL};

#[test]
fn large_error_bars_are_dusted_pointwise() -> Result<()> {
    let input = table(&[
        obs(1, 56000.1).err(Band::J, 0.6),
        obs(1, 56000.2).err(Band::J, 0.4),
        obs(2, 56000.1).err(Band::J, 0.5),
        obs(2, 56000.2).err(Band::J, f64::NAN).err(Band::K, 0.7),
    ]);

    let outcome = dust_error_bars(&input, DEFAULT_DUST_THRESHOLD, &SentinelPolicy::default())?;
    let output = &outcome.table;

    assert_eq!(output.height(), 4);
    assert_eq!(
        mags(output, Band::J),
        vec![NULL_SENTINEL, J_MAG, J_MAG, J_MAG]
    );
    assert_eq!(mags(output, Band::H), vec![H_MAG; 4]);
    assert_eq!(
        mags(output, Band::K),
        vec![K_MAG, K_MAG, K_MAG, NULL_SENTINEL]
    );
    assert!(outcome.diagnostics.is_empty());

    let before = errs(&input, Band::J);
    let after = errs(output, Band::J);
    assert_eq!(before[..3], after[..3]);
    assert!(after[3].is_nan());
    assert_eq!(flag_bits(output, Band::K), flag_bits(&input, Band::K));
    Ok(())
}

#[test]
fn negative_threshold_is_rejected() {
    let input = table(&[obs(1, 56000.1)]);
    assert!(matches!(
        dust_error_bars(&input, -0.1, &SentinelPolicy::default()),
        Err(CleanseError::InvalidThreshold { stage: "dust", .. })
    ));
}
