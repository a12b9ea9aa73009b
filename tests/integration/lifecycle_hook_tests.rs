//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 写入前分区钩子集成测试

use chrono::{DateTime, Duration, Utc};
use oxpartition::database::PartitionName;
use oxpartition::lifecycle::{PartitionHook, Partitionable};
use oxpartition::manager::PartitionManager;
use oxpartition::registry::TableRegistry;
use oxpartition::Config;

#[path = "../common/mod.rs"]
mod common;
use common::*;

/// 模拟宿主模型的一条记录
#[derive(Debug, Default)]
struct Order {
    created_at: Option<DateTime<Utc>>,
    created_at_changed: bool,
}

impl Order {
    fn at(instant: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(instant),
            created_at_changed: true,
        }
    }
}

impl Partitionable for Order {
    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        (column == "created_at").then_some(self.created_at).flatten()
    }

    fn set_timestamp(&mut self, column: &str, value: DateTime<Utc>) {
        if column == "created_at" {
            self.created_at = Some(value);
            self.created_at_changed = true;
        }
    }

    fn is_changed(&self, column: &str) -> bool {
        column == "created_at" && self.created_at_changed
    }
}

#[tokio::test]
async fn test_write_creates_covering_partition() {
    let (manager, adapter) = memory_manager("orders", Duration::hours(1));
    let hook = PartitionHook::new(manager.clone());

    let mut order = Order::at(hour(3) + Duration::minutes(45));
    hook.before_persist(&mut order).await.unwrap();

    let expected = PartitionName::build("orders", hour(3), hour(4)).unwrap();
    assert_eq!(adapter.attached_partitions(), vec![expected.into_string()]);
}

#[tokio::test]
async fn test_stale_cache_race_surfaces_overlap_and_aborts_write() {
    let (manager, adapter) = memory_manager("orders", Duration::hours(1));
    let hook = PartitionHook::new(manager.clone());

    // 一个与网格错开半小时的已有分区，锚点为 11:30
    let existing = PartitionName::build(
        "orders",
        hour(10) + Duration::minutes(30),
        hour(11) + Duration::minutes(30),
    )
    .unwrap();
    adapter.insert_table(existing.as_str());
    hook.before_persist(&mut Order::at(hour(10) + Duration::minutes(45)))
        .await
        .unwrap();
    assert_eq!(manager.latest_coverage_time().await.unwrap(), hour(11) + Duration::minutes(30));

    // 其他进程创建了 [11:00, 12:00)，本进程的缓存尚未看到
    let foreign = PartitionName::build("orders", hour(11), hour(12)).unwrap();
    adapter.insert_table(foreign.as_str());

    let err = hook
        .before_persist(&mut Order::at(hour(12) + Duration::minutes(15)))
        .await
        .unwrap_err();
    assert!(err.is_overlap());
    assert_eq!(adapter.attached_partitions().len(), 2);
}

#[tokio::test]
async fn test_connection_failure_aborts_write() {
    let (manager, adapter) = memory_manager("orders", Duration::hours(1));
    let hook = PartitionHook::new(manager);
    adapter.set_offline(true);

    let mut order = Order::default();
    assert!(hook.before_persist(&mut order).await.is_err());
}

#[tokio::test]
async fn test_registry_hook_populates_created_at() {
    setup_logging();
    let config = Config::from_toml_str(
        r#"
        [database]
        url = "memory:"

        [tables.orders]
        partition_period_secs = 86400
    "#,
    )
    .unwrap();
    let registry = TableRegistry::from_config(&config).await.unwrap();
    let table = registry.get("orders").unwrap();

    let mut order = Order::default();
    table.hook().before_persist(&mut order).await.unwrap();

    let created_at = order.created_at.unwrap();
    assert!(table
        .manager()
        .covers(&created_at.into())
        .await
        .unwrap());
}
