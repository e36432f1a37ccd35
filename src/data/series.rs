//! Per-entity aggregation and the daily "New Cases" delta.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use super::reshape::LongRecord;
use super::ReshapeError;
use crate::logging::log_series;

/// Cumulative count for one (entity, date), summed over sub-regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRecord {
    pub entity: String,
    pub date: NaiveDate,
    pub confirmed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaRecord {
    pub entity: String,
    pub date: NaiveDate,
    #[serde(rename = "Confirmed Overall")]
    pub confirmed: i64,
    /// `None` on the first observed date of an entity.
    #[serde(rename = "New Cases")]
    pub new_cases: Option<i64>,
}

/// Sum cumulative counts per (entity, date). Empty cells add nothing, so a
/// group made only of empty cells sums to zero. Rows with an empty entity
/// have no group and are dropped.
///
/// Output is sorted by entity, then date.
pub fn aggregate(long: &[LongRecord]) -> Result<Vec<AggregatedRecord>, ReshapeError> {
    let mut sums: BTreeMap<(&str, NaiveDate), i64> = BTreeMap::new();
    for rec in long.iter().filter(|r| !r.entity.is_empty()) {
        let sum = sums.entry((rec.entity.as_str(), rec.date)).or_insert(0);
        *sum = sum
            .checked_add(rec.confirmed.unwrap_or(0))
            .ok_or_else(|| ReshapeError::CountOverflow {
                entity: rec.entity.clone(),
                date: rec.date,
            })?;
    }
    Ok(sums
        .into_iter()
        .map(|((entity, date), confirmed)| AggregatedRecord {
            entity: entity.to_string(),
            date,
            confirmed,
        })
        .collect())
}

/// First difference of the cumulative count within each entity.
///
/// Each entity's rows are sorted by date before differencing, whatever order
/// they arrive in. Entities are emitted in order of first appearance.
pub fn derive_delta(aggregated: &[AggregatedRecord]) -> Result<Vec<DeltaRecord>, ReshapeError> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&AggregatedRecord>> = HashMap::new();
    for rec in aggregated {
        groups
            .entry(rec.entity.as_str())
            .or_insert_with(|| {
                order.push(rec.entity.as_str());
                Vec::new()
            })
            .push(rec);
    }

    let mut out = Vec::with_capacity(aggregated.len());
    for entity in &order {
        let Some(mut group) = groups.remove(entity) else {
            continue;
        };
        group.sort_by_key(|r| r.date);
        let mut prev: Option<i64> = None;
        for rec in group {
            let new_cases = match prev {
                None => None,
                Some(p) => Some(rec.confirmed.checked_sub(p).ok_or_else(|| {
                    ReshapeError::CountOverflow {
                        entity: rec.entity.clone(),
                        date: rec.date,
                    }
                })?),
            };
            out.push(DeltaRecord {
                entity: rec.entity.clone(),
                date: rec.date,
                confirmed: rec.confirmed,
                new_cases,
            });
            prev = Some(rec.confirmed);
        }
    }

    log_series(order.len(), out.len());
    Ok(out)
}
