//! Data model shared by the transducer, collectors and transport.

use std::fmt;

/// A value ready for transport.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Decoded log-sequence position.
    Counter(u64),
    /// Aggregated integer (PgBouncer backend sums and maxima).
    Integer(i64),
    /// Server text passed through unchanged; the transport coerces it.
    Raw(String),
}

impl MetricValue {
    /// Returns the value as a StatsD-compatible number literal, if it is one.
    pub fn as_numeric(&self) -> Option<String> {
        match self {
            MetricValue::Counter(v) => Some(v.to_string()),
            MetricValue::Integer(v) => Some(v.to_string()),
            MetricValue::Raw(s) => {
                let s = s.trim();
                match s.parse::<f64>() {
                    Ok(v) if v.is_finite() => Some(s.to_string()),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Counter(v) => write!(f, "{}", v),
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Raw(s) => f.write_str(s),
        }
    }
}

/// One metric sample: hierarchical path, optional value, collection time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub path: Vec<String>,
    pub value: Option<MetricValue>,
    /// Seconds since epoch, shared by every observation of one query.
    pub timestamp: i64,
}

impl Observation {
    pub fn new(path: Vec<String>, value: Option<MetricValue>, timestamp: i64) -> Self {
        Self {
            path,
            value,
            timestamp,
        }
    }

    /// Metric name with segments joined by `.`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Generic query result: ordered column names and rows of text cells.
///
/// Cells are `None` for SQL NULL. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a result from string literals. Intended for tests and mocks.
    pub fn from_rows(columns: &[&str], rows: &[&[Option<&str>]]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` in the column named `name`; `None` if NULL or no such column.
    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_looks_up_by_column_name() {
        let result = TabularResult::from_rows(
            &["database", "user", "cl_active"],
            &[&[Some("app"), Some("alice"), None]],
        );
        assert_eq!(result.value(0, "user"), Some("alice"));
        assert_eq!(result.value(0, "cl_active"), None);
        assert_eq!(result.value(0, "missing"), None);
        assert_eq!(result.value(1, "user"), None);
    }

    #[test]
    fn raw_numeric_detection() {
        assert_eq!(
            MetricValue::Raw("12.5".into()).as_numeric().as_deref(),
            Some("12.5")
        );
        assert_eq!(MetricValue::Raw("on".into()).as_numeric(), None);
        assert_eq!(MetricValue::Raw("NaN".into()).as_numeric(), None);
        assert_eq!(
            MetricValue::Counter(96181255240).as_numeric().as_deref(),
            Some("96181255240")
        );
    }

    #[test]
    fn dotted_path_joins_segments() {
        let obs = Observation::new(
            vec!["table".into(), "public".into(), "size".into()],
            None,
            0,
        );
        assert_eq!(obs.dotted_path(), "table.public.size");
    }
}
