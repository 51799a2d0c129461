//! CSV loading using Polars

use crate::error::{AnalyticsError, Result};
use crate::normalize::{RawTransaction, REQUIRED_COLUMNS};
use polars::prelude::*;
use std::path::Path;

/// Load the required transaction columns from a CSV file as raw text rows.
///
/// Every column is read as text so that parsing, and its failures, stay with
/// the [`Normalizer`](crate::normalize::Normalizer). Extra columns are ignored.
///
/// # Arguments
/// * `path` - Path to a CSV file with a header row
///
/// # Returns
/// One [`RawTransaction`] per data row. A structurally malformed file is
/// [`AnalyticsError::Csv`], an unreadable one [`AnalyticsError::Io`].
pub fn load_raw_transactions(path: impl AsRef<Path>) -> Result<Vec<RawTransaction>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AnalyticsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a readable file", path.display()),
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(AnalyticsError::Csv)?;

    log::debug!(
        "read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );

    raw_transactions_from_frame(&df)
}

/// Convert a frame holding the required columns into raw rows.
pub fn raw_transactions_from_frame(df: &DataFrame) -> Result<Vec<RawTransaction>> {
    let [id_col, amount_col, ts_col, dob_col] = REQUIRED_COLUMNS;
    let account_ids = text_column(df, id_col)?;
    let amounts = text_column(df, amount_col)?;
    let timestamps = text_column(df, ts_col)?;
    let births = text_column(df, dob_col)?;

    let rows = account_ids
        .into_iter()
        .zip(amounts)
        .zip(timestamps)
        .zip(births)
        .map(|(((account_id, txn_amount), txn_ts), date_of_birth)| RawTransaction {
            account_id,
            txn_amount,
            txn_ts,
            date_of_birth,
        })
        .collect();

    Ok(rows)
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| AnalyticsError::MissingColumn(name.to_string()))?;
    let as_text = column.cast(&DataType::String)?;
    let values = as_text
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect();
    Ok(values)
}
