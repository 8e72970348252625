//! Generic tabular result → observation transducer.
//!
//! Query results are mapped to metric paths by column naming convention:
//!
//! | Shape | Condition | Path per value |
//! |-------|-----------|----------------|
//! | Scalar | 1 column, 1 row | `prefix` |
//! | KeyValue | first column `key`, last `value` | `prefix + all but last cell` |
//! | KeyPrefix | first column `key`, last not `value` | `prefix + key* cells + value column name` |
//! | SingleRow | no leading `key` column, 1 row | `prefix + column name` |
//!
//! The shape is resolved once per result, not per row.

use crate::error::CollectError;
use crate::model::{Observation, TabularResult};

use super::decode::decode_value;
use super::sanitize::sanitize_labels;

const KEY_COLUMN: &str = "key";
const VALUE_COLUMN: &str = "value";

/// Column layout of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// No columns; nothing to emit.
    Empty,
    /// One column, one row (typically `SHOW <setting>`).
    Scalar,
    /// `key[, key2, ...], value`.
    KeyValue,
    /// `key, key2, ..., <value columns>`; `key_columns` leading columns start with `key`.
    KeyPrefix { key_columns: usize },
    /// One row, every column is a named value.
    SingleRow,
}

/// Classifies a result by its column names and row count.
pub fn classify(result: &TabularResult) -> ResultShape {
    let columns = &result.columns;
    match columns.len() {
        0 => ResultShape::Empty,
        1 if result.row_count() == 1 => ResultShape::Scalar,
        n if n >= 2 && columns[0] == KEY_COLUMN => {
            if columns[n - 1] == VALUE_COLUMN {
                ResultShape::KeyValue
            } else {
                let key_columns = columns
                    .iter()
                    .take_while(|c| c.starts_with(KEY_COLUMN))
                    .count();
                ResultShape::KeyPrefix { key_columns }
            }
        }
        _ => ResultShape::SingleRow,
    }
}

/// Converts a query result into observations under `prefix`.
///
/// Every path passes through the general sanitizer and every value through
/// the decoder. A result without key columns and with more than one row is
/// rejected as [`CollectError::UnexpectedShape`].
pub fn transduce(
    result: &TabularResult,
    prefix: &[&str],
    timestamp: i64,
) -> Result<Vec<Observation>, CollectError> {
    let prefix_labels = || prefix.iter().map(|p| Some(*p));
    let mut observations = Vec::new();

    match classify(result) {
        ResultShape::Empty => {}
        ResultShape::Scalar => {
            let cell = result.rows[0][0].as_deref();
            observations.push(Observation::new(
                sanitize_labels(prefix_labels()),
                decode_value(cell),
                timestamp,
            ));
        }
        ResultShape::KeyValue => {
            let last = result.column_count() - 1;
            for row in &result.rows {
                let keys = row[..last].iter().map(|c| c.as_deref());
                observations.push(Observation::new(
                    sanitize_labels(prefix_labels().chain(keys)),
                    decode_value(row[last].as_deref()),
                    timestamp,
                ));
            }
        }
        ResultShape::KeyPrefix { key_columns } => {
            for row in &result.rows {
                for (idx, column) in result.columns.iter().enumerate().skip(key_columns) {
                    let keys = row[..key_columns].iter().map(|c| c.as_deref());
                    let path = prefix_labels()
                        .chain(keys)
                        .chain(std::iter::once(Some(column.as_str())));
                    observations.push(Observation::new(
                        sanitize_labels(path),
                        decode_value(row[idx].as_deref()),
                        timestamp,
                    ));
                }
            }
        }
        ResultShape::SingleRow => match result.row_count() {
            0 => {}
            1 => {
                let row = &result.rows[0];
                for (column, cell) in result.columns.iter().zip(row) {
                    let path = prefix_labels().chain(std::iter::once(Some(column.as_str())));
                    observations.push(Observation::new(
                        sanitize_labels(path),
                        decode_value(cell.as_deref()),
                        timestamp,
                    ));
                }
            }
            rows => {
                return Err(CollectError::UnexpectedShape {
                    columns: result.column_count(),
                    rows,
                });
            }
        },
    }

    Ok(observations)
}
