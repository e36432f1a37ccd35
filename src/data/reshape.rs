//! Wide (one column per date) to long (one row per date) conversion.

use chrono::NaiveDate;

use super::{RawTable, ReshapeError};
use crate::logging::log_reshape;

/// Label of the value column produced by [`unpivot`].
pub const VALUE_LABEL: &str = "Confirmed Overall";

/// Names of the identifier columns. Every other column is a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdColumns {
    pub entity: String,
    pub sub_region: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl IdColumns {
    /// Layout of the CSSE time-series files.
    pub fn csse() -> Self {
        Self {
            entity: "Country/Region".to_string(),
            sub_region: Some("Province/State".to_string()),
            latitude: Some("Lat".to_string()),
            longitude: Some("Long".to_string()),
        }
    }

    pub fn entity_only(name: &str) -> Self {
        Self {
            entity: name.to_string(),
            sub_region: None,
            latitude: None,
            longitude: None,
        }
    }

    fn contains(&self, header: &str) -> bool {
        self.entity == header
            || [&self.sub_region, &self.latitude, &self.longitude]
                .into_iter()
                .flatten()
                .any(|name| name == header)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub entity: String,
    pub sub_region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: NaiveDate,
    /// Cumulative count; `None` for an empty cell.
    pub confirmed: Option<i64>,
}

/// Parse a `M/D/YY` column label. The century is fixed to 20xx.
pub fn parse_date_label(label: &str) -> Result<NaiveDate, ReshapeError> {
    let bad = || ReshapeError::BadDateLabel {
        label: label.to_string(),
    };
    let parts: Vec<&str> = label.trim().split('/').collect();
    let [month, day, year] = parts.as_slice() else {
        return Err(bad());
    };
    if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    NaiveDate::parse_from_str(&format!("{month}/{day}/20{year}"), "%m/%d/%Y").map_err(|_| bad())
}

fn parse_count(cell: &str, row: usize, column: &str) -> Result<Option<i64>, ReshapeError> {
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = cell.parse::<i64>() {
        return Ok(Some(v));
    }
    match cell.parse::<f64>() {
        // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
        Ok(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => Ok(Some(v as i64)),
        _ => Err(ReshapeError::BadValue {
            row,
            column: column.to_string(),
            value: cell.to_string(),
        }),
    }
}

/// Unpivot every non-identifier column into one [`LongRecord`] per
/// (row, date column), in row-major order.
///
/// Any unparseable date label or count aborts the whole reshape.
pub fn unpivot(table: &RawTable, ids: &IdColumns) -> Result<Vec<LongRecord>, ReshapeError> {
    let entity_idx = table
        .column_index(&ids.entity)
        .ok_or_else(|| ReshapeError::MissingColumn(ids.entity.clone()))?;
    let optional = |name: &Option<String>| match name {
        None => Ok(None),
        Some(n) => table
            .column_index(n)
            .map(Some)
            .ok_or_else(|| ReshapeError::MissingColumn(n.clone())),
    };
    let sub_region_idx = optional(&ids.sub_region)?;
    let latitude_idx = optional(&ids.latitude)?;
    let longitude_idx = optional(&ids.longitude)?;

    let date_columns = table
        .headers()
        .iter()
        .enumerate()
        .filter(|(_, header)| !ids.contains(header))
        .map(|(idx, header)| parse_date_label(header).map(|date| (idx, date)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(table.len() * date_columns.len());
    for (r, row) in table.rows().iter().enumerate() {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");
        let text = |idx: Option<usize>| idx.map(cell).filter(|s| !s.is_empty()).map(str::to_string);
        let coord = |idx: Option<usize>| idx.map(cell).and_then(|s| s.parse::<f64>().ok());

        let entity = cell(entity_idx).to_string();
        let sub_region = text(sub_region_idx);
        let latitude = coord(latitude_idx);
        let longitude = coord(longitude_idx);

        for &(idx, date) in &date_columns {
            let confirmed = parse_count(cell(idx), r, &table.headers()[idx])?;
            out.push(LongRecord {
                entity: entity.clone(),
                sub_region: sub_region.clone(),
                latitude,
                longitude,
                date,
                confirmed,
            });
        }
    }

    log_reshape(table.len(), date_columns.len(), out.len());
    Ok(out)
}
