//! Tabular payloads and the wide-to-long reshaping pipeline.

pub mod reshape;
pub mod series;

use std::io::Cursor;

use chrono::NaiveDate;
use polars::io::SerReader;
use polars::prelude::{CsvReadOptions, DataType, PolarsError};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while decoding a fetched payload into a [`RawTable`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("csv decode failed: {0}")]
    Csv(#[from] PolarsError),

    #[error("payload has no columns")]
    NoColumns,
}

/// Errors that abort a reshape. No partial table is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReshapeError {
    #[error("missing identifier column: {0}")]
    MissingColumn(String),

    #[error("unparseable date column label {label:?}")]
    BadDateLabel { label: String },

    #[error("non-integer count {value:?} in row {row}, column {column:?}")]
    BadValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("confirmed count for {entity:?} on {date} overflows")]
    CountOverflow { entity: String, date: NaiveDate },
}

/// A decoded CSV payload: header names and row-major string cells.
///
/// Null cells are stored as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    fingerprint: String,
}

impl RawTable {
    /// Build a table in memory. The fingerprint covers the cell contents.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut hasher = Sha256::new();
        for line in std::iter::once(&headers).chain(rows.iter()) {
            hasher.update(line.join("\u{1f}").as_bytes());
            hasher.update(b"\n");
        }
        let fingerprint = hex::encode(hasher.finalize());
        Self {
            headers,
            rows,
            fingerprint,
        }
    }

    /// Decode a comma-separated payload with a header row.
    ///
    /// Every column is read as text; typing happens in the reshaper.
    pub fn from_csv(text: &str) -> Result<Self, DecodeError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
            .finish()?;
        if df.width() == 0 {
            return Err(DecodeError::NoColumns);
        }

        let mut headers = Vec::with_capacity(df.width());
        let mut rows = vec![Vec::with_capacity(df.width()); df.height()];
        for column in df.get_columns() {
            headers.push(column.name().to_string());
            let column = column.cast(&DataType::String)?;
            for (row, value) in rows.iter_mut().zip(column.str()?.into_iter()) {
                row.push(value.unwrap_or_default().to_string());
            }
        }

        Ok(Self {
            headers,
            rows,
            fingerprint: payload_sha256(text),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

pub fn payload_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_quoted_fields_as_text() {
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20\n,\"Korea, South\",36.0,128.0,1\n";
        let table = RawTable::from_csv(csv).unwrap();
        assert_eq!(table.headers(), &["Province/State", "Country/Region", "Lat", "Long", "1/22/20"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0][0], "");
        assert_eq!(table.rows()[0][1], "Korea, South");
        assert_eq!(table.rows()[0][4], "1");
        assert_eq!(table.column_index("Lat"), Some(2));
        assert_eq!(table.column_index("Confirmed"), None);
    }

    #[test]
    fn fingerprint_tracks_payload() {
        let a = RawTable::from_csv("Region,1/22/20\nX,1\n").unwrap();
        let b = RawTable::from_csv("Region,1/22/20\nX,1\n").unwrap();
        let c = RawTable::from_csv("Region,1/22/20\nX,2\n").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint(), payload_sha256("Region,1/22/20\nX,1\n"));
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert!(RawTable::from_csv("").is_err());
    }
}
