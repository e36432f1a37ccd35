//! Fetch the latest daily report (today, else yesterday, in UTC) and print a
//! JSON summary of what was retrieved.
//!
//! Run with: cargo run --bin daily_report [YYYY-MM-DD]

use anyhow::{Context, Result};
use casewatch::feed::{Endpoints, Fetcher, HttpSource};
use casewatch::state::Config;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let today = match env::args().nth(1) {
        Some(arg) => NaiveDate::parse_from_str(&arg, "%Y-%m-%d")
            .with_context(|| format!("expected a YYYY-MM-DD date, got {arg:?}"))?,
        None => Utc::now().date_naive(),
    };

    let fetcher = Fetcher::new(HttpSource::new(cfg.fetch_timeout())?, Endpoints::from_config(&cfg)?);
    let report = fetcher
        .fetch_aggregated_on(today)
        .await
        .context("no daily report for today or yesterday")?;

    let payload = json!({
        "requested": today.to_string(),
        "date": report.date.to_string(),
        "url": report.url,
        "columns": report.table.headers(),
        "rows": report.table.len(),
        "fingerprint": report.table.fingerprint(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
