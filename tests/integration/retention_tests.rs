//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分区保留策略集成测试

use chrono::Duration;
use oxpartition::database::{AdapterCall, MemoryPartitionAdapter, PartitionName};
use oxpartition::manager::{PartitionConfig, PartitionManager, TimeRangePartitionManager};
use std::sync::Arc;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn name(from: i64, to: i64) -> String {
    PartitionName::build("events", hour(from), hour(to))
        .unwrap()
        .into_string()
}

async fn seed_hours(manager: &TimeRangePartitionManager, hours: std::ops::Range<i64>) {
    for h in hours {
        manager.create_partition(hour(h), hour(h + 1)).await.unwrap();
    }
}

#[tokio::test]
async fn test_retain_by_time_removes_exactly_expired_partitions() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    seed_hours(&manager, 0..6).await;

    let removed = manager.retain_by_time(hour(3)).await.unwrap();
    assert_eq!(removed, vec![name(0, 1), name(1, 2)]);
    assert_eq!(
        adapter.attached_partitions(),
        (2..6).map(|h| name(h, h + 1)).collect::<Vec<_>>()
    );

    // 同一截止时间再次执行不会删除更多分区
    assert!(manager.retain_by_time(hour(3)).await.unwrap().is_empty());
    assert_eq!(adapter.attached_partitions().len(), 4);
}

#[tokio::test]
async fn test_retain_by_time_keeps_partition_ending_at_cutoff() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    seed_hours(&manager, 0..3).await;

    // [1h, 2h) 的上界等于截止时间，只删除严格早于截止时间结束的分区
    let removed = manager.retain_by_time(hour(2)).await.unwrap();
    assert_eq!(removed, vec![name(0, 1)]);
    assert_eq!(adapter.attached_partitions(), vec![name(1, 2), name(2, 3)]);

    let removed = manager
        .retain_by_time(hour(2) + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, vec![name(1, 2)]);
    assert_eq!(adapter.attached_partitions(), vec![name(2, 3)]);
}

#[tokio::test]
async fn test_retain_by_time_on_empty_catalog() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));

    assert!(manager.retain_by_time(hour(3)).await.unwrap().is_empty());
    assert_eq!(adapter.calls(), vec![AdapterCall::List]);
}

#[tokio::test]
async fn test_retain_keeps_count_windows_before_start() {
    let (manager, _) = memory_manager("events", Duration::hours(1));
    seed_hours(&manager, 0..6).await;

    // cutoff = 06:00 - 1h * (2 + 1) = 03:00
    let removed = manager.retain(Duration::hours(1), 2, hour(6)).await.unwrap();
    assert_eq!(removed, vec![name(0, 1), name(1, 2)]);
}

#[tokio::test]
async fn test_retain_by_count_keeps_most_recent_past_and_current() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    // 05..10 为历史分区，[10:00, 11:00) 为当前写入分区（当前时间 10:30），11 点为未来分区
    seed_hours(&manager, 5..12).await;

    let removed = manager.retain_by_count(2).await.unwrap();
    assert_eq!(removed, vec![name(5, 6), name(6, 7), name(7, 8)]);
    assert_eq!(
        adapter.attached_partitions(),
        vec![name(8, 9), name(9, 10), name(10, 11), name(11, 12)]
    );
}

#[tokio::test]
async fn test_retain_by_count_larger_than_history_removes_nothing() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    seed_hours(&manager, 7..11).await;

    assert!(manager.retain_by_count(10).await.unwrap().is_empty());
    assert_eq!(adapter.attached_partitions().len(), 4);

    let removed = manager.retain_by_count(0).await.unwrap();
    assert_eq!(removed, vec![name(7, 8), name(8, 9), name(9, 10)]);
    assert_eq!(adapter.attached_partitions(), vec![name(10, 11)]);
}

#[tokio::test]
async fn test_removal_detaches_before_dropping_and_refreshes_once() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    seed_hours(&manager, 0..3).await;
    adapter.clear_calls();

    manager.retain_by_time(hour(2) + Duration::minutes(1)).await.unwrap();

    assert_eq!(
        adapter.calls(),
        vec![
            AdapterCall::List,
            AdapterCall::Detach(name(0, 1)),
            AdapterCall::Drop(name(0, 1)),
            AdapterCall::Detach(name(1, 2)),
            AdapterCall::Drop(name(1, 2)),
            AdapterCall::List,
        ]
    );
    assert!(!manager.covers_instant(hour(0)).await.unwrap());
    assert!(manager.covers_instant(hour(2)).await.unwrap());
}

#[tokio::test]
async fn test_failed_removal_propagates() {
    let (manager, adapter) = memory_manager("events", Duration::hours(1));
    seed_hours(&manager, 0..2).await;
    adapter.clear_calls();

    // 已分离但未删除的分区再次分离会失败
    manager
        .adapter()
        .detach_partition(&name(0, 1))
        .await
        .unwrap();

    assert!(manager.retain_by_time(hour(5)).await.is_err());
    assert!(!adapter
        .calls()
        .iter()
        .any(|call| matches!(call, AdapterCall::Drop(_))));
}

#[tokio::test]
async fn test_delete_expired_partitions_uses_retention_period() {
    setup_logging();
    let adapter = Arc::new(MemoryPartitionAdapter::new("events"));
    let config = PartitionConfig::builder("events")
        .partition_period(Duration::hours(1))
        .retention_period(Duration::hours(3))
        .build()
        .unwrap();
    let manager = TimeRangePartitionManager::new(config, adapter.clone()).with_clock(fixed_now);
    seed_hours(&manager, 5..11).await;

    // cutoff = 10:30 - 3h = 07:30
    let removed = manager.delete_expired_partitions().await.unwrap();
    assert_eq!(removed, vec![name(5, 6), name(6, 7)]);
}

#[tokio::test]
async fn test_delete_expired_partitions_uses_retention_count() {
    setup_logging();
    let adapter = Arc::new(MemoryPartitionAdapter::new("events"));
    let config = PartitionConfig::builder("events")
        .partition_period(Duration::hours(1))
        .retention_count(1)
        .build()
        .unwrap();
    let manager = TimeRangePartitionManager::new(config, adapter.clone()).with_clock(fixed_now);
    seed_hours(&manager, 8..11).await;

    let removed = manager.delete_expired_partitions().await.unwrap();
    assert_eq!(removed, vec![name(8, 9)]);
}
