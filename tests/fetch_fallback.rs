use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use casewatch::data::reshape::IdColumns;
use casewatch::data::RawTable;
use casewatch::feed::{Endpoints, FetchError, Fetcher, ResourceKind, ResourceSource};
use casewatch::pipeline::load_snapshot;
use chrono::NaiveDate;

const BASE: &str = "https://data.test/daily_reports";
const SERIES: &str = "https://data.test/time_series.csv";

const YESTERDAY_CSV: &str = "\
Province/State,Country/Region,Last Update,Confirmed,Deaths,Recovered
Hubei,Mainland China,2020-03-06T14:23:02,67592,2931,37150
,Italy,2020-03-06T17:53:03,4636,197,523
";

/// Serves canned responses keyed by URL; anything else is a 404.
struct ScriptedSource {
    responses: HashMap<String, Result<String, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn new(responses: Vec<(&str, Result<String, FetchError>)>) -> Self {
        Self {
            responses: responses
                .into_iter()
                .map(|(url, resp)| (url.to_string(), resp))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceSource for ScriptedSource {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses.get(url).cloned().unwrap_or_else(|| {
            Err(FetchError::NotFound {
                url: url.to_string(),
            })
        })
    }
}

fn fetcher(responses: Vec<(&str, Result<String, FetchError>)>) -> Fetcher<ScriptedSource> {
    Fetcher::new(ScriptedSource::new(responses), Endpoints::new(BASE, SERIES).unwrap())
}

fn march(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
}

#[tokio::test]
async fn falls_back_to_yesterday_when_today_is_missing() {
    let yesterday_url = format!("{BASE}/03-06-2020.csv");
    let f = fetcher(vec![(yesterday_url.as_str(), Ok(YESTERDAY_CSV.to_string()))]);

    let report = f.fetch_aggregated_on(march(7)).await.unwrap();

    assert_eq!(report.date, march(6));
    assert_eq!(report.url, yesterday_url);
    assert_eq!(report.table, RawTable::from_csv(YESTERDAY_CSV).unwrap());
    assert_eq!(
        f.source().calls(),
        vec![f.endpoints().daily_report(march(7)), yesterday_url.clone()]
    );
}

#[tokio::test]
async fn uses_today_when_available() {
    let today_url = format!("{BASE}/03-07-2020.csv");
    let f = fetcher(vec![(today_url.as_str(), Ok(YESTERDAY_CSV.to_string()))]);
    let report = f.fetch_aggregated_on(march(7)).await.unwrap();
    assert_eq!(report.date, march(7));
    assert_eq!(f.source().calls(), vec![today_url]);
}

#[tokio::test]
async fn malformed_today_also_falls_back() {
    let today_url = format!("{BASE}/03-07-2020.csv");
    let yesterday_url = format!("{BASE}/03-06-2020.csv");
    let f = fetcher(vec![
        (today_url.as_str(), Ok(String::new())),
        (yesterday_url.as_str(), Ok(YESTERDAY_CSV.to_string())),
    ]);
    let report = f.fetch_aggregated_on(march(7)).await.unwrap();
    assert_eq!(report.date, march(6));
}

#[tokio::test]
async fn falls_back_only_once() {
    let today_url = format!("{BASE}/03-07-2020.csv");
    let f = fetcher(vec![(
        today_url.as_str(),
        Err(FetchError::Network {
            url: today_url.clone(),
            reason: "connect failed".to_string(),
        }),
    )]);
    let err = f.fetch_aggregated_on(march(7)).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::NotFound {
            url: format!("{BASE}/03-06-2020.csv")
        }
    );
    assert_eq!(f.source().calls().len(), 2);
}

#[tokio::test]
async fn time_series_failure_is_returned_without_fallback() {
    let f = fetcher(vec![]);
    let err = f.fetch(ResourceKind::TimeSeries).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(err.url(), SERIES);
    assert_eq!(f.source().calls(), vec![SERIES.to_string()]);
}

#[tokio::test]
async fn load_snapshot_refuses_a_failed_fetch() {
    let f = fetcher(vec![]);
    let err = load_snapshot(&f, &IdColumns::csse()).await.unwrap_err();
    assert!(format!("{err:#}").contains("time series unavailable"));
}

#[tokio::test]
async fn load_snapshot_derives_series() {
    let csv = "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n,Italy,43.0,12.0,0,2\n";
    let f = fetcher(vec![(SERIES, Ok(csv.to_string()))]);
    let snap = load_snapshot(&f, &IdColumns::csse()).await.unwrap();
    assert_eq!(snap.entities(), &["Italy"]);
    assert_eq!(snap.series()[1].new_cases, Some(2));
}
