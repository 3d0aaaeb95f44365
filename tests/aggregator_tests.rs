use std::sync::Arc;

use tally::{
    db::{MemoryStore, MetricStore, MetricTable},
    events::{Block, EventKind, RawEvent, TransferEvent},
    writer::{replay_events, MetricAggregator},
    AggregateError, AggregatorSettings,
};
use tokio_util::sync::CancellationToken;

// 2024-01-15T12:00:00Z
const JAN_15_2024: Block = Block {
    timestamp: 1_705_320_000,
};
// 2024-02-10T09:00:00Z
const FEB_10_2024: Block = Block {
    timestamp: 1_707_555_600,
};
// 2024-02-29T23:59:59Z
const FEB_29_2024: Block = Block {
    timestamp: 1_709_251_199,
};

fn raw() -> RawEvent {
    RawEvent {
        from_address: "0x04d0390b777b424e43839cd1e744799f3de6c176c7e32c1812a41dbd9c19db6a".to_string(),
        keys: vec!["0x9149d2123147c5f43d258257fef0b7b969db78269369ebcf5ebb9eef8592f2".to_string()],
        data: vec![],
    }
}

/// `tokens` whole tokens at 18 decimals, as the framework delivers them.
fn tokens(whole: u64, hundredths: u64) -> TransferEvent {
    let raw = u128::from(whole) * 10u128.pow(18) + u128::from(hundredths) * 10u128.pow(16);
    TransferEvent::new("0", raw.to_string().as_str())
}

#[tokio::test]
async fn test_deposit_updates_global_month_and_day() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let event = TransferEvent::new("0", "1500000000000000000");

    let aggregated = aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&event))
        .await
        .unwrap()
        .expect("event should be applied");
    assert_eq!(aggregated.amount, 1.5);
    assert_eq!(aggregated.day_id, "2024/01/15");

    for (table, id) in [
        (MetricTable::Global, "global"),
        (MetricTable::Monthly, "2024/01"),
        (MetricTable::Daily, "2024/01/15"),
    ] {
        let row = store.get_metric(table, id).await.unwrap().unwrap();
        assert_eq!(row.deposit_count, 1, "{} {}", table, id);
        assert_eq!(row.deposit_amount, 1.5, "{} {}", table, id);
        assert_eq!(row.withdrawal_count, 0, "{} {}", table, id);
        assert_eq!(row.withdrawal_amount, 0.0, "{} {}", table, id);
        assert_eq!(row.month, "01");
        assert_eq!(row.year, 2024);
    }

    let daily = store.get_metric(MetricTable::Daily, "2024/01/15").await.unwrap().unwrap();
    assert_eq!(daily.day.as_deref(), Some("15"));
    let monthly = store.get_metric(MetricTable::Monthly, "2024/01").await.unwrap().unwrap();
    assert_eq!(monthly.day, None);
}

#[tokio::test]
async fn test_deposit_and_withdrawal_do_not_touch_each_other() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();

    aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(2, 50)))
        .await
        .unwrap();
    aggregator
        .on_withdrawal(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(1, 25)))
        .await
        .unwrap();
    aggregator
        .on_withdrawal(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(0, 25)))
        .await
        .unwrap();

    let day = store.get_metric(MetricTable::Daily, "2024/01/15").await.unwrap().unwrap();
    assert_eq!(day.deposit_count, 1);
    assert_eq!(day.deposit_amount, 2.5);
    assert_eq!(day.withdrawal_count, 2);
    assert_eq!(day.withdrawal_amount, 1.5);

    let global = store.get_metric(MetricTable::Global, "global").await.unwrap().unwrap();
    assert_eq!(global.deposit_count, day.deposit_count);
    assert_eq!(global.deposit_amount, day.deposit_amount);
    assert_eq!(global.withdrawal_count, day.withdrawal_count);
    assert_eq!(global.withdrawal_amount, day.withdrawal_amount);
    assert_eq!(global.day, None);
}

#[tokio::test]
async fn test_same_event_twice_doubles_counts() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let event = tokens(3, 0);

    for _ in 0..2 {
        aggregator
            .on_deposit(&store, &FEB_10_2024, Some(&raw()), Some(&event))
            .await
            .unwrap();
    }

    let month = store.get_metric(MetricTable::Monthly, "2024/02").await.unwrap().unwrap();
    assert_eq!(month.deposit_count, 2);
    assert_eq!(month.deposit_amount, 6.0);
}

#[tokio::test]
async fn test_events_only_reach_their_own_buckets() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();

    aggregator
        .on_deposit(&store, &FEB_10_2024, Some(&raw()), Some(&tokens(1, 0)))
        .await
        .unwrap();
    aggregator
        .on_deposit(&store, &FEB_29_2024, Some(&raw()), Some(&tokens(2, 0)))
        .await
        .unwrap();
    aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(4, 0)))
        .await
        .unwrap();

    let months: Vec<(String, u64, f64)> = store
        .rows(MetricTable::Monthly)
        .await
        .into_iter()
        .map(|r| (r.id, r.deposit_count, r.deposit_amount))
        .collect();
    assert_eq!(
        months,
        vec![
            ("2024/01".to_string(), 1, 4.0),
            ("2024/02".to_string(), 2, 3.0),
        ]
    );

    let days: Vec<String> = store
        .rows(MetricTable::Daily)
        .await
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(days, vec!["2024/01/15", "2024/02/10", "2024/02/29"]);

    let global = store.get_metric(MetricTable::Global, "global").await.unwrap().unwrap();
    assert_eq!(global.deposit_count, 3);
    assert_eq!(global.deposit_amount, 7.0);
    // Denormalized month of the global row is that of the first event
    assert_eq!(global.month, "02");
}

#[tokio::test]
async fn test_missing_event_or_raw_log_is_skipped() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let event = tokens(1, 0);

    let outcomes = [
        aggregator.on_deposit(&store, &JAN_15_2024, None, Some(&event)).await,
        aggregator.on_deposit(&store, &JAN_15_2024, Some(&raw()), None).await,
        aggregator.on_withdrawal(&store, &JAN_15_2024, None, None).await,
    ];
    for outcome in outcomes {
        assert!(matches!(outcome, Ok(None)));
    }

    for table in MetricTable::ALL {
        assert!(store.rows(table).await.is_empty());
    }
}

#[tokio::test]
async fn test_malformed_amount_writes_nothing() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let event = TransferEvent::new("0", "not-a-number");

    let err = aggregator
        .on_withdrawal(&store, &JAN_15_2024, Some(&raw()), Some(&event))
        .await
        .unwrap_err();
    assert!(matches!(err, AggregateError::MalformedAmount { limb: "low", .. }));
    assert!(!err.is_storage());

    for table in MetricTable::ALL {
        assert!(store.rows(table).await.is_empty());
    }
}

#[tokio::test]
async fn test_storage_failure_leaves_all_rows_unchanged() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();

    aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(1, 0)))
        .await
        .unwrap();
    let before: Vec<_> = all_rows(&store).await;

    store.fail_next(1);
    let err = aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(5, 0)))
        .await
        .unwrap_err();
    assert!(err.is_storage());
    assert_eq!(all_rows(&store).await, before);

    // The framework re-delivers the event; it now applies exactly once
    aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(5, 0)))
        .await
        .unwrap();
    let day = store.get_metric(MetricTable::Daily, "2024/01/15").await.unwrap().unwrap();
    assert_eq!(day.deposit_count, 2);
    assert_eq!(day.deposit_amount, 6.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_in_same_day_are_not_lost() {
    let store = Arc::new(MemoryStore::new());
    let aggregator = Arc::new(MetricAggregator::default());

    aggregator
        .on_withdrawal(store.as_ref(), &JAN_15_2024, Some(&raw()), Some(&tokens(1, 0)))
        .await
        .unwrap();

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let store = store.clone();
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                aggregator
                    .on_withdrawal(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(0, 50)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let day = store.get_metric(MetricTable::Daily, "2024/01/15").await.unwrap().unwrap();
    assert_eq!(day.withdrawal_count, 65);
    assert_eq!(day.withdrawal_amount, 33.0);
    assert_eq!(day.deposit_count, 0);

    let global = store.get_metric(MetricTable::Global, "global").await.unwrap().unwrap();
    assert_eq!(global.withdrawal_count, 65);
}

#[tokio::test]
async fn test_global_bucket_can_be_disabled() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::new(AggregatorSettings {
        include_global_bucket: false,
        ..AggregatorSettings::default()
    });

    aggregator
        .on_deposit(&store, &JAN_15_2024, Some(&raw()), Some(&tokens(1, 0)))
        .await
        .unwrap();

    assert!(store.rows(MetricTable::Global).await.is_empty());
    assert_eq!(store.rows(MetricTable::Monthly).await.len(), 1);
    assert_eq!(store.rows(MetricTable::Daily).await.len(), 1);
}

#[tokio::test]
async fn test_replay_applies_and_skips_records() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let log = r#"{"kind":"deposit","block":{"timestamp":1705320000},"raw_event":{"from_address":"0x1"},"event":{"amount":{"high":"0","low":"1500000000000000000"}}}

{"kind":"withdrawal","block":{"timestamp":1705320000},"raw_event":{},"event":{"amount":{"high":"0x0","low":"0x6f05b59d3b20000"}}}
{"kind":"deposit","block":{"timestamp":1707555600},"event":{"amount":{"high":"0","low":"1"}}}
{"kind":"deposit","block":{"timestamp":1707555600},"raw_event":{},"event":{"amount":{"high":0,"low":2000000000000000000}}}
"#;

    let summary = replay_events(&aggregator, &store, log.as_bytes(), 4, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.skipped, 1);

    let global = store.get_metric(MetricTable::Global, "global").await.unwrap().unwrap();
    assert_eq!(global.deposit_count, 2);
    assert_eq!(global.deposit_amount, 3.5);
    assert_eq!(global.withdrawal_count, 1);
    assert_eq!(global.withdrawal_amount, 0.5);
}

#[tokio::test]
async fn test_replay_reports_the_bad_line() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let log = "{\"kind\":\"deposit\",\"block\":{\"timestamp\":0}}\n{\"kind\":\"refund\"}\n";

    let err = replay_events(&aggregator, &store, log.as_bytes(), 1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AggregateError::InvalidRecord { line: 2, .. }));
}

#[tokio::test]
async fn test_replay_accepts_integer_limbs_wider_than_u64() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    // 20 tokens: 2e19 does not fit in a u64
    let log = r#"{"kind":"deposit","block":{"timestamp":1705320000},"raw_event":{},"event":{"amount":{"high":0,"low":20000000000000000000}}}"#;

    let summary = replay_events(&aggregator, &store, log.as_bytes(), 1, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.applied, 1);

    let daily = store.get_metric(MetricTable::Daily, "2024/01/15").await.unwrap().unwrap();
    assert_eq!(daily.deposit_count, 1);
    assert_eq!(daily.deposit_amount, 20.0);
}

#[tokio::test]
async fn test_replay_rejects_negative_integer_limb_as_malformed_amount() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let log = r#"{"kind":"withdrawal","block":{"timestamp":1705320000},"raw_event":{},"event":{"amount":{"high":0,"low":-1}}}"#;

    let err = replay_events(&aggregator, &store, log.as_bytes(), 1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AggregateError::MalformedAmount { limb: "low", .. }), "{:?}", err);
    assert!(all_rows(&store).await.is_empty());
}

#[tokio::test]
async fn test_replay_stops_when_cancelled() {
    let store = MemoryStore::new();
    let aggregator = MetricAggregator::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let log = r#"{"kind":"deposit","block":{"timestamp":0},"raw_event":{},"event":{"amount":{"high":"0","low":"1"}}}"#;
    let summary = replay_events(&aggregator, &store, log.as_bytes(), 1, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.applied, 0);
    assert!(store.rows(MetricTable::Daily).await.is_empty());
}

#[test]
fn test_replay_record_json_shape() {
    let record = tally::writer::ReplayRecord {
        kind: EventKind::Withdrawal,
        block: JAN_15_2024,
        raw_event: Some(raw()),
        event: Some(tokens(1, 0)),
    };
    let json = serde_json::to_string(&record).unwrap();
    let back: tally::writer::ReplayRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

async fn all_rows(store: &MemoryStore) -> Vec<tally::db::MetricRow> {
    let mut all = Vec::new();
    for table in MetricTable::ALL {
        all.extend(store.rows(table).await);
    }
    all
}

