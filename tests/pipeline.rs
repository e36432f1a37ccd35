use std::collections::BTreeSet;

use casewatch::data::reshape::{unpivot, IdColumns};
use casewatch::data::series::{aggregate, derive_delta, AggregatedRecord};
use casewatch::data::{RawTable, ReshapeError};
use casewatch::pipeline::{build_snapshot, derive_series};
use chrono::NaiveDate;

const SERIES_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
Hubei,China,30.9756,112.2707,444,444,549
Beijing,China,40.1824,116.4142,14,22,36
,Thailand,15.0,101.0,2,3,5
,\"Korea, South\",36.0,128.0,1,1,2
Washington,US,47.4009,-121.4905,0,1,1
";

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        headers.iter().map(|s| s.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
    )
}

#[test]
fn single_region_scenario() {
    let t = table(&["Region", "1/22/20", "1/23/20"], &[&["X", "1", "3"]]);
    let ids = IdColumns::entity_only("Region");

    let long = unpivot(&t, &ids).unwrap();
    let pairs: Vec<_> = long.iter().map(|r| (r.entity.as_str(), r.date, r.confirmed)).collect();
    assert_eq!(
        pairs,
        vec![("X", ymd(2020, 1, 22), Some(1)), ("X", ymd(2020, 1, 23), Some(3))]
    );

    let agg = aggregate(&long).unwrap();
    assert_eq!(
        agg,
        vec![
            AggregatedRecord { entity: "X".to_string(), date: ymd(2020, 1, 22), confirmed: 1 },
            AggregatedRecord { entity: "X".to_string(), date: ymd(2020, 1, 23), confirmed: 3 },
        ]
    );

    let deltas = derive_delta(&agg).unwrap();
    assert_eq!(deltas[0].new_cases, None);
    assert_eq!(deltas[1].new_cases, Some(2));
}

#[test]
fn unpivot_row_count_is_rows_times_dates() {
    let t = RawTable::from_csv(SERIES_CSV).unwrap();
    let long = unpivot(&t, &IdColumns::csse()).unwrap();
    assert_eq!(long.len(), t.len() * 3);

    let before: BTreeSet<(String, String)> = t
        .rows()
        .iter()
        .map(|r| (r[1].clone(), r[0].clone()))
        .collect();
    let after: BTreeSet<(String, String)> = long
        .iter()
        .map(|r| (r.entity.clone(), r.sub_region.clone().unwrap_or_default()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn sub_regions_are_summed_before_differencing() {
    let t = RawTable::from_csv(SERIES_CSV).unwrap();
    let series = derive_series(&t, &IdColumns::csse()).unwrap();

    let china: Vec<_> = series.iter().filter(|r| r.entity == "China").collect();
    assert_eq!(china.len(), 3);
    assert_eq!(china[0].confirmed, 458);
    assert_eq!(china[0].new_cases, None);
    assert_eq!(china[1].new_cases, Some(8));
    assert_eq!(china[2].new_cases, Some(119));

    let korea: Vec<_> = series.iter().filter(|r| r.entity == "Korea, South").collect();
    assert_eq!(korea.iter().map(|r| r.new_cases).collect::<Vec<_>>(), vec![None, Some(0), Some(1)]);
}

#[test]
fn every_entity_starts_with_an_absent_delta() {
    let t = RawTable::from_csv(SERIES_CSV).unwrap();
    let series = derive_series(&t, &IdColumns::csse()).unwrap();
    let mut seen = BTreeSet::new();
    for rec in &series {
        if seen.insert(rec.entity.clone()) {
            assert_eq!(rec.new_cases, None, "{} first row", rec.entity);
        } else {
            assert!(rec.new_cases.is_some(), "{} later row", rec.entity);
        }
    }
    assert_eq!(seen.len(), 4);
}

#[test]
fn date_columns_out_of_order_still_difference_by_date() {
    let t = table(
        &["Region", "1/24/20", "1/22/20", "1/23/20"],
        &[&["X", "10", "1", "4"]],
    );
    let series = derive_series(&t, &IdColumns::entity_only("Region")).unwrap();
    let got: Vec<_> = series.iter().map(|r| (r.date, r.new_cases)).collect();
    assert_eq!(
        got,
        vec![
            (ymd(2020, 1, 22), None),
            (ymd(2020, 1, 23), Some(3)),
            (ymd(2020, 1, 24), Some(6)),
        ]
    );
}

#[test]
fn rerunning_the_pipeline_is_idempotent() {
    let t = RawTable::from_csv(SERIES_CSV).unwrap();
    let first = derive_series(&t, &IdColumns::csse()).unwrap();
    let second = derive_series(&t, &IdColumns::csse()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn bad_date_label_produces_no_snapshot() {
    let t = table(&["Region", "1/22/20", "Jan 23"], &[&["X", "1", "3"]]);
    let err = build_snapshot(&t, &IdColumns::entity_only("Region")).unwrap_err();
    assert!(matches!(err, ReshapeError::BadDateLabel { .. }));
}

#[test]
fn snapshot_lists_sorted_entities() {
    let t = RawTable::from_csv(SERIES_CSV).unwrap();
    let snap = build_snapshot(&t, &IdColumns::csse()).unwrap();
    assert_eq!(snap.entities(), &["China", "Korea, South", "Thailand", "US"]);
    assert_eq!(snap.fingerprint(), t.fingerprint());
}

#[test]
fn overflowing_sub_region_sum_aborts_the_load() {
    let csv = "\
Province/State,Country/Region,Lat,Long,1/22/20
A,X,1.0,1.0,9223372036854775807
B,X,1.0,1.0,1
";
    let t = RawTable::from_csv(csv).unwrap();
    let err = derive_series(&t, &IdColumns::csse()).unwrap_err();
    assert!(matches!(err, ReshapeError::CountOverflow { ref entity, .. } if entity == "X"));
}

#[test]
fn out_of_range_count_is_not_clamped() {
    let t = table(&["Region", "1/22/20"], &[&["X", "1e30"]]);
    let err = derive_series(&t, &IdColumns::entity_only("Region")).unwrap_err();
    assert!(matches!(err, ReshapeError::BadValue { .. }));
}

#[test]
fn rows_without_entity_stay_out_of_the_selector() {
    let csv = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20
A,,1.0,1.0,1,5
,Italy,43.0,12.0,0,2
";
    let t = RawTable::from_csv(csv).unwrap();
    let snap = build_snapshot(&t, &IdColumns::csse()).unwrap();
    assert_eq!(snap.entities(), &["Italy"]);
    assert!(snap.series().iter().all(|r| r.entity == "Italy"));
}
