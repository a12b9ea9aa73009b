//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 时间范围分区管理器集成测试（内存适配器）

use chrono::{Duration, Utc};
use oxpartition::database::{AdapterCall, PartitionName};
use oxpartition::error::PartitionError;
use oxpartition::manager::{PartitionManager, PartitionValue};
use rand::Rng;

#[path = "../common/mod.rs"]
mod common;
use common::*;

const PERIODS_SECS: [i64; 5] = [900, 3600, 5400, 21600, 86400];

#[tokio::test]
async fn test_ensure_coverage_always_covers_value() {
    let mut rng = rand::thread_rng();

    for _ in 0..50 {
        let period = Duration::seconds(PERIODS_SECS[rng.gen_range(0..PERIODS_SECS.len())]);
        let (manager, _) = memory_manager("events", period);

        let offset_ms = rng.gen_range(-30 * 86_400_000i64..30 * 86_400_000i64);
        let value = fixed_now() + Duration::milliseconds(offset_ms);

        manager.ensure_coverage(value, period).await.unwrap();
        assert!(
            manager.covers_instant(value).await.unwrap(),
            "{} not covered with period {}",
            value,
            period
        );
    }
}

#[tokio::test]
async fn test_windows_on_one_grid_never_overlap() {
    let mut rng = rand::thread_rng();
    let period = Duration::hours(2);
    let (manager, adapter) = memory_manager("events", period);

    for _ in 0..40 {
        let offset_secs = rng.gen_range(-7 * 86_400i64..7 * 86_400i64);
        let value = fixed_now() + Duration::seconds(offset_secs);
        manager.ensure_coverage(value, period).await.unwrap();
        assert!(manager.covers_instant(value).await.unwrap());
    }

    let mut ranges = manager.reload_active_ranges().await.unwrap();
    ranges.sort_by_key(|r| r.start);
    for pair in ranges.windows(2) {
        assert!(pair[0].end <= pair[1].start, "{} overlaps {}", pair[0], pair[1]);
        assert_eq!(pair[0].duration(), period);
    }
    assert_eq!(ranges.len(), adapter.attached_partitions().len());
}

#[tokio::test]
async fn test_empty_enumeration_covers_nothing() {
    let (manager, _) = memory_manager("events", Duration::hours(1));

    assert!(manager.reload_active_ranges().await.unwrap().is_empty());
    assert!(!manager.covers_instant(fixed_now()).await.unwrap());
    assert!(!manager.covers_instant(hour(0)).await.unwrap());
}

#[tokio::test]
async fn test_covers_known_partition() {
    let (manager, _) = memory_manager("events", Duration::hours(1));
    manager.create_partition(hour(0), hour(1)).await.unwrap();

    assert!(manager
        .covers_instant(hour(0) + Duration::minutes(30))
        .await
        .unwrap());
    assert!(!manager.covers_instant(hour(2)).await.unwrap());
}

#[tokio::test]
async fn test_premake_from_creates_exactly_count_partitions() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));

    let created = manager
        .premake_from(Duration::hours(1), 3, Some(hour(0)))
        .await
        .unwrap();

    let expected: Vec<String> = (0..3)
        .map(|h| {
            PartitionName::build("events", hour(h), hour(h + 1))
                .unwrap()
                .into_string()
        })
        .collect();
    assert_eq!(created, expected);
    assert_eq!(adapter.attached_partitions(), expected);
}

#[tokio::test]
async fn test_premake_without_start_extends_from_coverage_edge() {
    let (manager, _) = memory_manager("events", Duration::hours(1));

    // 空目录：从当前整点 10:00 开始，直到覆盖 10:30 + 3h
    let created = manager.premake(3).await.unwrap();
    assert_eq!(created.len(), 4);
    assert_eq!(manager.latest_coverage_time().await.unwrap(), hour(14));

    // 覆盖已达到目标，不再创建
    assert!(manager.premake(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_premake_over_existing_partitions_is_noop() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    manager
        .premake_from(Duration::hours(1), 2, Some(hour(0)))
        .await
        .unwrap();

    let again = manager
        .premake_from(Duration::hours(1), 2, Some(hour(0)))
        .await
        .unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(adapter.attached_partitions().len(), 2);
}

#[tokio::test]
async fn test_backfill_before_anchor_stays_on_grid() {
    let (manager, _) = memory_manager("events", Duration::hours(1));
    manager.create_partition(hour(10), hour(11)).await.unwrap();

    let value = hour(-48) + Duration::minutes(17);
    let created = manager
        .ensure_coverage(value, Duration::hours(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.from(), hour(-48));
    assert_eq!(created.to(), hour(-47));
}

#[tokio::test]
async fn test_overlapping_create_is_rejected() {
    let (manager, _) = memory_manager("events", Duration::hours(1));
    manager.create_partition(hour(10), hour(11)).await.unwrap();

    let err = manager
        .create_partition(hour(10) + Duration::minutes(30), hour(11) + Duration::minutes(30))
        .await
        .unwrap_err();
    assert!(err.is_overlap());
    match err {
        PartitionError::Overlap { conflicting, .. } => {
            let existing = PartitionName::build("events", hour(10), hour(11)).unwrap();
            assert_eq!(conflicting.as_deref(), Some(existing.as_str()));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_prefix_sharing_tables_are_ignored() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    let foreign = PartitionName::build("events_archive", hour(0), hour(1)).unwrap();
    adapter.insert_table(foreign.as_str());
    adapter.insert_table("events_p_backup");

    assert!(manager.reload_active_ranges().await.unwrap().is_empty());
    assert!(manager.partition_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_period_is_rejected() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));

    for period in [Duration::zero(), Duration::hours(-1), Duration::milliseconds(1500)] {
        let result = manager.ensure_coverage(fixed_now(), period).await;
        assert!(matches!(result, Err(PartitionError::InvalidInput(_))));
    }
    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_callers_create_one_partition() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    let value = PartitionValue::Timestamp(hour(20) + Duration::minutes(5));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move { manager.ensure_partition(&value).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let creates = adapter
        .calls()
        .into_iter()
        .filter(|call| matches!(call, AdapterCall::Create { .. }))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(adapter.attached_partitions().len(), 1);
}

#[tokio::test]
async fn test_partitions_are_listed_in_time_order() {
    let (manager, _) = memory_manager("events", Duration::hours(1));
    for h in [5, 1, 3] {
        manager.create_partition(hour(h), hour(h + 1)).await.unwrap();
    }

    let starts: Vec<_> = manager
        .partitions()
        .await
        .unwrap()
        .iter()
        .map(|p| p.from())
        .collect();
    assert_eq!(starts, vec![hour(1), hour(3), hour(5)]);
    assert!(starts.iter().all(|s| *s < Utc::now()));
}
