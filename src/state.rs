use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::data::series::DeltaRecord;

pub const DEFAULT_DAILY_REPORTS_BASE: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports";
pub const DEFAULT_TIME_SERIES_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_19-covid-Confirmed.csv";

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// Directory URL holding one `MM-DD-YYYY.csv` report per day
    pub daily_reports_base: String,
    pub time_series_url: String,
    pub fetch_timeout_secs: u64,
    /// Entity preselected in the dashboard
    pub default_entity: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8050".to_string()),
            daily_reports_base: std::env::var("DAILY_REPORTS_BASE").unwrap_or_else(|_| DEFAULT_DAILY_REPORTS_BASE.to_string()),
            time_series_url: std::env::var("TIME_SERIES_URL").unwrap_or_else(|_| DEFAULT_TIME_SERIES_URL.to_string()),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            default_entity: std::env::var("DEFAULT_ENTITY").unwrap_or_else(|_| "US".to_string()),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8050".to_string(),
            daily_reports_base: DEFAULT_DAILY_REPORTS_BASE.to_string(),
            time_series_url: DEFAULT_TIME_SERIES_URL.to_string(),
            fetch_timeout_secs: 30,
            default_entity: "US".to_string(),
        }
    }
}

/// Immutable result of the startup load.
///
/// Built once by [`crate::pipeline::load_snapshot`] and shared read-only with
/// every request handler.
#[derive(Debug, Clone)]
pub struct Snapshot {
    series: Vec<DeltaRecord>,
    entities: Vec<String>,
    loaded_at: DateTime<Utc>,
    fingerprint: String,
}

impl Snapshot {
    pub fn new(series: Vec<DeltaRecord>, fingerprint: String, loaded_at: DateTime<Utc>) -> Self {
        let entities = series
            .iter()
            .map(|r| r.entity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            series,
            entities,
            loaded_at,
            fingerprint,
        }
    }

    pub fn series(&self) -> &[DeltaRecord] {
        &self.series
    }

    /// Distinct entity names, sorted.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.entities.binary_search_by(|e| e.as_str().cmp(name)).is_ok()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// SHA-256 of the payload the snapshot was derived from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
