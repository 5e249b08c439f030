#![allow(dead_code)]

use photclean_core::schema::{PhotometryTable, SOURCE_ID, TIMESTAMP};
use photclean_core::sentinel::Band;
use polars::prelude::*;

pub const J_MAG: f64 = 12.0;
pub const H_MAG: f64 = 11.5;
pub const K_MAG: f64 = 11.0;

/// One star-exposure row of a fixture table.
#[derive(Debug, Clone)]
pub struct Obs {
    pub source_id: i64,
    pub mjd: f64,
    pub mag: [f64; 3],
    pub err: [f64; 3],
    pub flags: [i64; 3],
}

pub fn obs(source_id: i64, mjd: f64) -> Obs {
    Obs {
        source_id,
        mjd,
        mag: [J_MAG, H_MAG, K_MAG],
        err: [0.05; 3],
        flags: [0; 3],
    }
}

fn slot(band: Band) -> usize {
    match band {
        Band::J => 0,
        Band::H => 1,
        Band::K => 2,
    }
}

impl Obs {
    pub fn mag(mut self, band: Band, value: f64) -> Self {
        self.mag[slot(band)] = value;
        self
    }

    pub fn err(mut self, band: Band, value: f64) -> Self {
        self.err[slot(band)] = value;
        self
    }

    pub fn flags(mut self, band: Band, value: i64) -> Self {
        self.flags[slot(band)] = value;
        self
    }
}

pub fn frame(rows: &[Obs]) -> DataFrame {
    let mut columns: Vec<Column> = vec![
        Series::new(
            SOURCE_ID.into(),
            rows.iter().map(|row| row.source_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            TIMESTAMP.into(),
            rows.iter().map(|row| row.mjd).collect::<Vec<_>>(),
        )
        .into(),
    ];

    for band in Band::ALL {
        let i = slot(band);
        columns.push(
            Series::new(
                band.magnitude_column().into(),
                rows.iter().map(|row| row.mag[i]).collect::<Vec<_>>(),
            )
            .into(),
        );
        columns.push(
            Series::new(
                band.error_column().into(),
                rows.iter().map(|row| row.err[i]).collect::<Vec<_>>(),
            )
            .into(),
        );
        columns.push(
            Series::new(
                band.flag_column().into(),
                rows.iter().map(|row| row.flags[i]).collect::<Vec<_>>(),
            )
            .into(),
        );
    }

    DataFrame::new(columns).expect("construct fixture dataframe")
}

pub fn table(rows: &[Obs]) -> PhotometryTable {
    PhotometryTable::from_frame(frame(rows)).expect("valid fixture table")
}

pub fn mags(table: &PhotometryTable, band: Band) -> Vec<f64> {
    table
        .magnitudes(band)
        .expect("magnitude column")
        .into_no_null_iter()
        .collect()
}

pub fn errs(table: &PhotometryTable, band: Band) -> Vec<f64> {
    table
        .errors(band)
        .expect("error column")
        .into_no_null_iter()
        .collect()
}

pub fn flag_bits(table: &PhotometryTable, band: Band) -> Vec<i64> {
    table
        .flags(band)
        .expect("flag column")
        .into_no_null_iter()
        .collect()
}

pub fn grades(table: &PhotometryTable, band: Band) -> Vec<f64> {
    table
        .grades(band)
        .expect("grade column readable")
        .expect("grade column present")
        .into_no_null_iter()
        .collect()
}

pub fn source_ids(table: &PhotometryTable) -> Vec<i64> {
    table
        .source_ids()
        .expect("source ids")
        .into_no_null_iter()
        .collect()
}
