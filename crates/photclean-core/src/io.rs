use std::fs::File;
use std::path::Path;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;

use crate::error::{CleanseError, Result};

pub use polars::prelude::DataFrame;

enum TableFormat {
    Csv,
    Parquet,
}

fn table_format(path: &Path) -> Result<TableFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Ok(TableFormat::Csv),
        Some("parquet") | Some("pq") => Ok(TableFormat::Parquet),
        _ => Err(CleanseError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

/// Reads a CSV or Parquet table, chosen by extension.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let df = match table_format(path)? {
        TableFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(File::open(path)?)
            .finish()?,
        TableFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
    };
    Ok(df)
}

/// Writes `df` as CSV or Parquet, chosen by extension.
pub fn write_frame(df: &DataFrame, path: &Path) -> Result<()> {
    let format = table_format(path)?;
    let mut output = df.clone();
    let mut file = File::create(path)?;
    match format {
        TableFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut output)?;
        }
        TableFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .with_compression(ParquetCompression::Zstd(None))
                .with_statistics(StatisticsOptions::default())
                .finish(&mut output)?;
        }
    }
    Ok(())
}
