//! Startup load: fetch the time series once and derive the immutable snapshot.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::data::reshape::{unpivot, IdColumns};
use crate::data::series::{aggregate, derive_delta, DeltaRecord};
use crate::data::{RawTable, ReshapeError};
use crate::feed::{Fetcher, ResourceKind, ResourceSource};
use crate::logging::{log_snapshot_ready, v_str, ProfileScope};
use crate::state::Snapshot;

/// Unpivot, aggregate per (entity, date) and derive daily deltas.
pub fn derive_series(table: &RawTable, ids: &IdColumns) -> Result<Vec<DeltaRecord>, ReshapeError> {
    let long = unpivot(table, ids)?;
    derive_delta(&aggregate(&long)?)
}

pub fn build_snapshot(table: &RawTable, ids: &IdColumns) -> Result<Snapshot, ReshapeError> {
    let series = derive_series(table, ids)?;
    Ok(Snapshot::new(series, table.fingerprint().to_string(), Utc::now()))
}

/// Fetch the cumulative time series and build the snapshot served for the
/// lifetime of the process. A failed fetch is never reshaped.
pub async fn load_snapshot<S: ResourceSource>(fetcher: &Fetcher<S>, ids: &IdColumns) -> Result<Snapshot> {
    let _scope = ProfileScope::with_context("load_snapshot", &[("url", v_str(fetcher.endpoints().time_series()))]);
    let table = fetcher
        .fetch(ResourceKind::TimeSeries)
        .await
        .context("time series unavailable")?;
    let snapshot = build_snapshot(&table, ids).context("time series could not be reshaped")?;
    log_snapshot_ready(snapshot.entities().len(), snapshot.series().len(), snapshot.fingerprint());
    Ok(snapshot)
}
