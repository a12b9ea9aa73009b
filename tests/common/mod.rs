//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

use chrono::{DateTime, Duration, TimeZone, Utc};
use oxpartition::database::MemoryPartitionAdapter;
use oxpartition::manager::{PartitionConfig, TimeRangePartitionManager};
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 测试使用的固定“当前时间”：2025-06-01 10:30:00 UTC
#[allow(dead_code)]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap()
}

/// 2025-06-01 00:00:00 UTC 之后第 `hours` 个整点
#[allow(dead_code)]
pub fn hour(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

/// 基于内存适配器、固定时钟的管理器
#[allow(dead_code)]
pub fn memory_manager(
    table: &str,
    period: Duration,
) -> (Arc<TimeRangePartitionManager>, Arc<MemoryPartitionAdapter>) {
    setup_logging();

    let adapter = Arc::new(MemoryPartitionAdapter::new(table));
    let config = PartitionConfig::builder(table)
        .partition_period(period)
        .build()
        .unwrap();
    let manager = TimeRangePartitionManager::new(config, adapter.clone()).with_clock(fixed_now);
    (Arc::new(manager), adapter)
}
