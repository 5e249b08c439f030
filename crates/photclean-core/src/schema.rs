use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use tracing::debug;

use crate::error::{CleanseError, Result};
use crate::sentinel::Band;

pub const SOURCE_ID: &str = "SOURCEID";
pub const TIMESTAMP: &str = "MEANMJDOBS";

/// Survey night an exposure belongs to (MJD truncated toward zero).
pub fn night_of(mjd: f64) -> i64 {
    mjd.trunc() as i64
}

/// A photometry table whose schema has been checked and whose zero-id rows are gone.
///
/// Required columns are `SOURCEID` (Int64), `MEANMJDOBS` (Float64) and, for every band,
/// `{B}APERMAG3` / `{B}APERMAG3ERR` (Float64) plus `{B}PPERRBITS` (Int64). Grade columns
/// `{B}GRADE` are optional and only exist once a table has been graded.
#[derive(Debug, Clone)]
pub struct PhotometryTable {
    df: DataFrame,
}

impl PhotometryTable {
    pub fn from_frame(mut df: DataFrame) -> Result<Self> {
        normalize_column(&mut df, SOURCE_ID, &DataType::Int64)?;
        normalize_column(&mut df, TIMESTAMP, &DataType::Float64)?;
        for band in Band::ALL {
            normalize_column(&mut df, band.magnitude_column(), &DataType::Float64)?;
            normalize_column(&mut df, band.error_column(), &DataType::Float64)?;
            normalize_column(&mut df, band.flag_column(), &DataType::Int64)?;
            if df.column(band.grade_column()).is_ok() {
                normalize_column(&mut df, band.grade_column(), &DataType::Float64)?;
            }
        }

        let ids = df.column(SOURCE_ID)?.i64()?;
        if let Some(source_id) = ids.into_no_null_iter().find(|id| *id < 0) {
            return Err(CleanseError::InvalidSourceId { source_id });
        }

        let keep = ids.not_equal(0);
        let before = df.height();
        let df = df.filter(&keep)?;
        let dropped = before - df.height();
        if dropped > 0 {
            debug!(dropped, "dropped rows with SOURCEID 0");
        }

        let timestamps = df.column(TIMESTAMP)?.f64()?;
        if let Some(timestamp) = timestamps.into_no_null_iter().find(|ts| !ts.is_finite()) {
            return Err(CleanseError::InvalidKey {
                kind: "timestamp",
                key: timestamp.to_string(),
            });
        }

        Ok(Self { df })
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn source_ids(&self) -> Result<&Int64Chunked> {
        Ok(self.df.column(SOURCE_ID)?.i64()?)
    }

    pub fn timestamps(&self) -> Result<&Float64Chunked> {
        Ok(self.df.column(TIMESTAMP)?.f64()?)
    }

    pub fn magnitudes(&self, band: Band) -> Result<&Float64Chunked> {
        Ok(self.df.column(band.magnitude_column())?.f64()?)
    }

    pub fn errors(&self, band: Band) -> Result<&Float64Chunked> {
        Ok(self.df.column(band.error_column())?.f64()?)
    }

    pub fn flags(&self, band: Band) -> Result<&Int64Chunked> {
        Ok(self.df.column(band.flag_column())?.i64()?)
    }

    pub fn grades(&self, band: Band) -> Result<Option<&Float64Chunked>> {
        match self.df.column(band.grade_column()) {
            Ok(column) => Ok(Some(column.f64()?)),
            Err(_) => Ok(None),
        }
    }

    /// Number of magnitudes in `band` currently holding `null`.
    pub fn nulled_count(&self, band: Band, null: f64) -> Result<usize> {
        Ok(self
            .magnitudes(band)?
            .into_no_null_iter()
            .filter(|magnitude| *magnitude == null)
            .count())
    }

    pub(crate) fn nullify(&mut self, band: Band, mask: &BooleanChunked, null: f64) -> Result<()> {
        let name = band.magnitude_column();
        let updated = self
            .df
            .column(name)?
            .f64()?
            .set(mask, Some(null))?
            .with_name(name.into());
        self.df.with_column(updated.into_series())?;
        Ok(())
    }

    pub(crate) fn replace_grades(&mut self, band: Band, grades: Vec<f64>) -> Result<()> {
        if grades.len() != self.height() {
            return Err(CleanseError::LengthMismatch {
                column: band.grade_column().to_string(),
                expected: self.height(),
                found: grades.len(),
            });
        }
        let series = Float64Chunked::from_vec(band.grade_column().into(), grades).into_series();
        self.df.with_column(series)?;
        Ok(())
    }

    pub(crate) fn ensure_rows_preserved(&self, input: &Self, stage: &'static str) -> Result<()> {
        if self.height() != input.height() {
            return Err(CleanseError::RowCountChanged {
                stage,
                expected: input.height(),
                found: self.height(),
            });
        }
        Ok(())
    }
}

/// Sorted distinct nights present in the table.
pub fn distinct_nights(table: &PhotometryTable) -> Result<Vec<i64>> {
    let nights: BTreeSet<i64> = table
        .timestamps()?
        .into_no_null_iter()
        .map(night_of)
        .collect();
    Ok(nights.into_iter().collect())
}

/// Sorted distinct exposure timestamps present in the table.
pub fn distinct_exposures(table: &PhotometryTable) -> Result<Vec<f64>> {
    let mut exposures: Vec<f64> = table.timestamps()?.into_no_null_iter().collect();
    exposures.sort_by(f64::total_cmp);
    exposures.dedup();
    Ok(exposures)
}

/// Distinct exposures per night, keyed by night.
pub fn exposures_per_night(table: &PhotometryTable) -> Result<BTreeMap<i64, usize>> {
    let mut counts = BTreeMap::new();
    for exposure in distinct_exposures(table)? {
        *counts.entry(night_of(exposure)).or_insert(0) += 1;
    }
    Ok(counts)
}

pub(crate) fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| CleanseError::MissingColumn {
        column: name.to_string(),
    })
}

/// Reads a required integer column, rejecting nulls. Float columns must hold whole numbers
/// that fit in an `i64`.
pub(crate) fn int_values(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = required_column(df, name)?;
    reject_nulls(column, name)?;
    let column = cast_to_int(column, name)?;
    Ok(column.i64()?.into_no_null_iter().collect())
}

fn cast_to_int(column: &Column, name: &str) -> Result<Column> {
    if column.dtype().is_float() {
        let values = column.cast(&DataType::Float64)?;
        if let Some(value) = values.f64()?.into_no_null_iter().find(|v| !is_whole_i64(*v)) {
            return Err(CleanseError::NonIntegerValue {
                column: name.to_string(),
                value,
            });
        };
    }
    Ok(column.strict_cast(&DataType::Int64)?)
}

// 2^63 is exactly representable; every finite whole f64 below it converts losslessly.
fn is_whole_i64(value: f64) -> bool {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    value.is_finite() && value.fract() == 0.0 && value >= -LIMIT && value < LIMIT
}

fn normalize_column(df: &mut DataFrame, name: &str, dtype: &DataType) -> Result<()> {
    let column = required_column(df, name)?;
    if column.dtype() != dtype {
        let cast = match dtype {
            DataType::Int64 => {
                reject_nulls(column, name)?;
                cast_to_int(column, name)?
            }
            _ => column.cast(dtype)?,
        };
        df.with_column(cast)?;
    }
    reject_nulls(df.column(name)?, name)
}

fn reject_nulls(column: &Column, name: &str) -> Result<()> {
    let count = column.null_count();
    if count > 0 {
        return Err(CleanseError::NullValues {
            column: name.to_string(),
            count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ids: Vec<i64>, timestamps: Vec<f64>) -> DataFrame {
        let rows = ids.len();
        let mut columns: Vec<Column> = vec![
            Series::new(SOURCE_ID.into(), ids).into(),
            Series::new(TIMESTAMP.into(), timestamps).into(),
        ];
        for band in Band::ALL {
            columns.push(Series::new(band.magnitude_column().into(), vec![12.0f64; rows]).into());
            columns.push(Series::new(band.error_column().into(), vec![0.05f64; rows]).into());
            columns.push(Series::new(band.flag_column().into(), vec![0i32; rows]).into());
        }
        DataFrame::new(columns).expect("construct dataframe")
    }

    #[test]
    fn zero_source_ids_are_dropped_and_types_normalised() {
        let df = frame(vec![0, 7, 0, 9], vec![56000.1, 56000.2, 56001.3, 56001.4]);
        let table = PhotometryTable::from_frame(df).expect("valid table");

        assert_eq!(table.height(), 2);
        let ids: Vec<i64> = table.source_ids().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec![7, 9]);
        assert_eq!(
            table.frame().column(Band::K.flag_column()).unwrap().dtype(),
            &DataType::Int64
        );
        assert!(table.grades(Band::J).unwrap().is_none());
    }

    #[test]
    fn missing_column_and_negative_ids_fail_loudly() {
        let df = frame(vec![1, 2], vec![56000.1, 56000.2])
            .drop(Band::H.error_column())
            .unwrap();
        match PhotometryTable::from_frame(df) {
            Err(CleanseError::MissingColumn { column }) => assert_eq!(column, "HAPERMAG3ERR"),
            other => panic!("expected missing column, got {other:?}"),
        }

        let df = frame(vec![1, -4], vec![56000.1, 56000.2]);
        assert!(matches!(
            PhotometryTable::from_frame(df),
            Err(CleanseError::InvalidSourceId { source_id: -4 })
        ));

        let mut df = frame(vec![1, 2], vec![56000.1, 56000.2]);
        df.with_column(Series::new(SOURCE_ID.into(), vec![1.0f64, 2.5]))
            .unwrap();
        assert!(matches!(
            PhotometryTable::from_frame(df),
            Err(CleanseError::NonIntegerValue { .. })
        ));
    }

    #[test]
    fn non_finite_timestamps_fail_loudly() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let df = frame(vec![1, 1], vec![bad, 56000.1]);
            assert!(matches!(
                PhotometryTable::from_frame(df),
                Err(CleanseError::InvalidKey {
                    kind: "timestamp",
                    ..
                })
            ));
        }

        // A zero-id row is dropped before it is inspected.
        let df = frame(vec![0, 1], vec![f64::NAN, 56000.1]);
        let table = PhotometryTable::from_frame(df).unwrap();
        assert_eq!(distinct_nights(&table).unwrap(), vec![56000]);
    }

    #[test]
    fn float_integer_columns_must_hold_whole_numbers() {
        let df = df!["NIGHT" => [56000.0f64, 56001.0]].unwrap();
        assert_eq!(int_values(&df, "NIGHT").unwrap(), vec![56000, 56001]);

        let df = df!["NIGHT" => [56000.7f64, 56001.0]].unwrap();
        match int_values(&df, "NIGHT") {
            Err(CleanseError::NonIntegerValue { column, value }) => {
                assert_eq!(column, "NIGHT");
                assert_eq!(value, 56000.7);
            }
            other => panic!("expected non-integer error, got {other:?}"),
        }

        for bad in [f64::NAN, f64::INFINITY, 1.0e19] {
            let df = df!["NIGHT" => [bad]].unwrap();
            assert!(matches!(
                int_values(&df, "NIGHT"),
                Err(CleanseError::NonIntegerValue { .. })
            ));
        }

        let df = df!["NIGHT" => [Some(56000.0f64), None]].unwrap();
        assert!(matches!(
            int_values(&df, "NIGHT"),
            Err(CleanseError::NullValues { count: 1, .. })
        ));
    }

    #[test]
    fn nights_are_truncated_and_listed_once() {
        let df = frame(vec![1, 2, 3, 4], vec![56001.7, 56000.1, 56000.1, 56000.9]);
        let table = PhotometryTable::from_frame(df).unwrap();

        assert_eq!(distinct_nights(&table).unwrap(), vec![56000, 56001]);
        assert_eq!(distinct_exposures(&table).unwrap(), vec![56000.1, 56000.9, 56001.7]);

        let per_night = exposures_per_night(&table).unwrap();
        assert_eq!(per_night.get(&56000), Some(&2));
        assert_eq!(per_night.get(&56001), Some(&1));
    }
}
