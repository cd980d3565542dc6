//! # Observation Loading and Validation Module
//!
//! This module is the only entry point for user-provided data. It reads the
//! comma-separated observation table, checks it against a fixed schema, and turns
//! it into a list of zero-based (entity, slot, value) triples ready for the
//! sparse grid.
//!
//! - Fixed Schema: the columns `id`, `date` and `sum` are required. Any other
//!   column is ignored.
//! - User-Centric Errors: failures are assumed to be input errors, and the
//!   `DataError` enum names the offending column and row.
//! - Entity bound: rows whose `id` lies past the configured entity count are
//!   never reached by the reducer, so they are counted and skipped rather than
//!   rejected.

use crate::config::SlotLayout;
use itertools::izip;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const ID_COLUMN: &str = "id";
pub const DATE_COLUMN: &str = "date";
pub const SUM_COLUMN: &str = "sum";

/// A single validated cell of the grid, with zero-based coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub entity: usize,
    pub slot: usize,
    pub value: f64,
}

/// The validated observation table plus bookkeeping about what was read.
#[derive(Debug)]
pub struct ObservationTable {
    pub observations: Vec<Observation>,
    /// Number of data rows in the file.
    pub rows_read: usize,
    /// Rows dropped because their `id` exceeds the configured entity count.
    pub rows_skipped: usize,
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("The input file contains a header but no data rows.")]
    EmptyInput,
    #[error("Column '{column_name}' holds the non-integer index {value} at data row {row}.")]
    NonIntegerIndex {
        column_name: &'static str,
        row: usize,
        value: f64,
    },
    #[error(
        "Column '{column_name}' holds the index {value} at data row {row}, outside the valid range 1..={max}."
    )]
    IndexOutOfRange {
        column_name: &'static str,
        row: usize,
        value: i64,
        max: usize,
    },
}

/// Loads and validates the observation table for the given layout.
pub fn load_observations(path: &Path, layout: &SlotLayout) -> Result<ObservationTable, DataError> {
    log::info!("Loading observations from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                // Type columns from every row, not a prefix.
                .with_infer_schema_length(None)
                .with_parse_options(CsvParseOptions::default().with_separator(b',')),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyInput);
    }

    let columns_set: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for col_name in [ID_COLUMN, DATE_COLUMN, SUM_COLUMN] {
        if !columns_set.contains(col_name) {
            return Err(DataError::ColumnNotFound(col_name.to_string()));
        }
    }

    let ids = internal::extract_numeric_column(&df, ID_COLUMN)?;
    let dates = internal::extract_numeric_column(&df, DATE_COLUMN)?;
    let sums = internal::extract_numeric_column(&df, SUM_COLUMN)?;

    let mut observations = Vec::with_capacity(df.height());
    let mut rows_skipped = 0usize;
    for (row, (&id, &date, &value)) in izip!(&ids, &dates, &sums).enumerate() {
        // Data rows are reported 1-based, the header not counted.
        let row = row + 1;
        let entity = internal::one_based_index(ID_COLUMN, row, id, usize::MAX)?;
        let slot = internal::one_based_index(DATE_COLUMN, row, date, layout.slots)?;
        if entity > layout.entities {
            rows_skipped += 1;
            continue;
        }
        observations.push(Observation {
            entity: entity - 1,
            slot: slot - 1,
            value,
        });
    }

    if rows_skipped > 0 {
        log::warn!(
            "Skipped {rows_skipped} rows whose id exceeds the configured entity count of {}",
            layout.entities
        );
    }
    log::debug!(
        "Validated {} observations from {} data rows",
        observations.len(),
        df.height()
    );

    Ok(ObservationTable {
        observations,
        rows_read: df.height(),
        rows_skipped,
    })
}

mod internal {
    use super::*;

    fn validate_is_finite(values: &[f64], column_name: &str) -> Result<(), DataError> {
        if values.iter().any(|&v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(())
    }

    pub(super) fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<f64>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        // A non-strict cast turns unparsable text into nulls.
        if casted.null_count() > 0 {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        validate_is_finite(&values, column_name)?;
        Ok(values)
    }

    /// Checks that `value` is an integer in `1..=max` and returns it.
    pub(super) fn one_based_index(
        column_name: &'static str,
        row: usize,
        value: f64,
        max: usize,
    ) -> Result<usize, DataError> {
        if value.fract() != 0.0 {
            return Err(DataError::NonIntegerIndex {
                column_name,
                row,
                value,
            });
        }
        let index = value as i64;
        if index < 1 || (index as u64) > max as u64 {
            return Err(DataError::IndexOutOfRange {
                column_name,
                row,
                value: index,
                max,
            });
        }
        Ok(index as usize)
    }
}
