//! Retrieval of the upstream CSV resources.
//!
//! Two resource families exist. The daily "aggregated" reports are addressed
//! by UTC date and fall back once to the previous day when today's report is
//! unavailable. The cumulative time series lives at a single fixed URL and has
//! no fallback: its failure is handed back to the caller as a typed
//! [`FetchError`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use url::Url;

use crate::data::RawTable;
use crate::logging::{log_fetch_attempt, log_fetch_failed, log_fetch_fallback, log_fetch_ok};
use crate::state::Config;

mod http;

pub use http::{classify_status, HttpSource};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("malformed payload from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
}

impl FetchError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Malformed { .. } => "malformed",
            Self::Network { .. } => "network",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::NotFound { url } | Self::Malformed { url, .. } | Self::Network { url, .. } => url,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Aggregated,
    TimeSeries,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Aggregated => "aggregated",
            ResourceKind::TimeSeries => "time_series",
        }
    }
}

/// Transport for plain-text resources.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Resolved resource addresses.
#[derive(Clone, Debug)]
pub struct Endpoints {
    daily_reports_base: Url,
    time_series: Url,
}

impl Endpoints {
    pub fn new(daily_reports_base: &str, time_series: &str) -> Result<Self> {
        Ok(Self {
            daily_reports_base: Url::parse(daily_reports_base)
                .with_context(|| format!("invalid daily reports base url: {daily_reports_base}"))?,
            time_series: Url::parse(time_series)
                .with_context(|| format!("invalid time series url: {time_series}"))?,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.daily_reports_base, &cfg.time_series_url)
    }

    /// `<base>/MM-DD-YYYY.csv`
    pub fn daily_report(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}.csv",
            self.daily_reports_base.as_str().trim_end_matches('/'),
            date.format("%m-%d-%Y")
        )
    }

    pub fn time_series(&self) -> &str {
        self.time_series.as_str()
    }
}

/// A daily report together with the date it was actually retrieved for.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub url: String,
    pub table: RawTable,
}

pub struct Fetcher<S> {
    source: S,
    endpoints: Endpoints,
}

impl<S: ResourceSource> Fetcher<S> {
    pub fn new(source: S, endpoints: Endpoints) -> Self {
        Self { source, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch(&self, kind: ResourceKind) -> Result<RawTable, FetchError> {
        match kind {
            ResourceKind::Aggregated => self
                .fetch_aggregated_on(Utc::now().date_naive())
                .await
                .map(|report| report.table),
            ResourceKind::TimeSeries => self.fetch_time_series().await,
        }
    }

    /// Fetch the report for `today`, or for the day before if that fails for
    /// any reason. The second failure is returned as-is.
    pub async fn fetch_aggregated_on(&self, today: NaiveDate) -> Result<DailyReport, FetchError> {
        let primary = self.endpoints.daily_report(today);
        if let Ok(table) = self.fetch_table(ResourceKind::Aggregated, &primary).await {
            return Ok(DailyReport {
                date: today,
                url: primary,
                table,
            });
        }

        let yesterday = today
            .pred_opt()
            .ok_or_else(|| FetchError::NotFound { url: primary.clone() })?;
        let fallback = self.endpoints.daily_report(yesterday);
        log_fetch_fallback(&primary, &fallback);
        let table = self.fetch_table(ResourceKind::Aggregated, &fallback).await?;
        Ok(DailyReport {
            date: yesterday,
            url: fallback,
            table,
        })
    }

    pub async fn fetch_time_series(&self) -> Result<RawTable, FetchError> {
        let url = self.endpoints.time_series().to_string();
        self.fetch_table(ResourceKind::TimeSeries, &url).await
    }

    async fn fetch_table(&self, kind: ResourceKind, url: &str) -> Result<RawTable, FetchError> {
        log_fetch_attempt(kind.as_str(), url);
        let result = match self.source.get_text(url).await {
            Ok(text) => RawTable::from_csv(&text).map_err(|e| FetchError::Malformed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        };
        match &result {
            Ok(table) => log_fetch_ok(kind.as_str(), url, table.len(), table.fingerprint()),
            Err(e) => log_fetch_failed(kind.as_str(), url, e.kind(), &e.to_string()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_report_url_uses_us_date_order() {
        let ep = Endpoints::new("https://example.org/reports/", "https://example.org/ts.csv").unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 3, 7).unwrap();
        assert_eq!(ep.daily_report(date), "https://example.org/reports/03-07-2020.csv");
        assert_eq!(ep.time_series(), "https://example.org/ts.csv");
    }

    #[test]
    fn rejects_relative_urls() {
        assert!(Endpoints::new("reports", "https://example.org/ts.csv").is_err());
    }

    #[test]
    fn error_kind_and_url() {
        let err = FetchError::Malformed {
            url: "u".to_string(),
            reason: "r".to_string(),
        };
        assert_eq!(err.kind(), "malformed");
        assert_eq!(err.url(), "u");
    }
}
