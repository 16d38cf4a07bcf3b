// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use syslog_sentinel_rs::{
    cfg::{config::StoreConfig, enums::IndexRotation},
    metrics::Metrics,
    store::StoreClient,
};

use crate::unit_tests::enrich_message;

fn client_with(rotation: IndexRotation, prefix: &str) -> StoreClient {
    let cfg = StoreConfig {
        index_prefix: prefix.to_string(),
        rotation,
        ..StoreConfig::default()
    };
    let metrics = Metrics::new().expect("metrics registry");
    StoreClient::new(cfg, metrics).expect("store client")
}

#[test]
fn test_daily_rollover_produces_one_index_per_day() {
    let client = client_with(IndexRotation::Daily, "sentinel-logs");

    let mut first = enrich_message("<134>1 - h a - - - day one");
    first.base.received_at = "2025-03-01T23:59:59Z".to_string();
    let mut second = enrich_message("<134>1 - h a - - - day two");
    second.base.received_at = "2025-03-02T00:00:01Z".to_string();
    let mut third = enrich_message("<134>1 - h a - - - also day two");
    third.base.received_at = "2025-03-02T08:00:00Z".to_string();

    assert_eq!(client.index_for(&first), "sentinel-logs-2025.03.01");
    assert_eq!(client.index_for(&second), "sentinel-logs-2025.03.02");
    assert_eq!(client.index_for(&third), "sentinel-logs-2025.03.02");
}

#[test]
fn test_monthly_rollover_collapses_days() {
    let client = client_with(IndexRotation::Monthly, "audit");

    let mut first = enrich_message("<134>1 - h a - - - early");
    first.base.received_at = "2025-03-01T00:00:00Z".to_string();
    let mut second = enrich_message("<134>1 - h a - - - late");
    second.base.received_at = "2025-03-31T00:00:00Z".to_string();

    assert_eq!(client.index_for(&first), "audit-2025.03");
    assert_eq!(client.index_for(&first), client.index_for(&second));
}

#[test]
fn test_weekly_rollover_shape() {
    let client = client_with(IndexRotation::Weekly, "sentinel-logs");

    let mut record = enrich_message("<134>1 - h a - - - weekly");
    record.base.received_at = "2025-03-05T00:00:00Z".to_string();

    let name = client.index_for(&record);
    let suffix = name
        .strip_prefix("sentinel-logs-")
        .expect("prefix in place");
    let (year, week) = suffix.split_once('.').expect("year.week suffix");
    assert_eq!(year, "2025");
    assert_eq!(week.len(), 2);
    assert!(week.parse::<u8>().expect("numeric week") <= 53);
}

#[test]
fn test_utc_date_drives_the_suffix() {
    let client = client_with(IndexRotation::Daily, "sentinel-logs");

    // 23:30 on March 1st in UTC+2 is 21:30 UTC, still March 1st.
    let mut record = enrich_message("<134>1 - h a - - - tz check");
    record.base.received_at = "2025-03-01T23:30:00+02:00".to_string();
    assert_eq!(client.index_for(&record), "sentinel-logs-2025.03.01");

    // 01:30 on March 2nd in UTC+3 is 22:30 UTC on March 1st.
    record.base.received_at = "2025-03-02T01:30:00+03:00".to_string();
    assert_eq!(client.index_for(&record), "sentinel-logs-2025.03.01");
}
