//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 写入前的分区钩子
//!
//! 宿主代码在持久化一条分区表记录之前调用 [`PartitionHook::before_persist`]，
//! 钩子返回错误时写入必须中止。

use crate::error::{PartitionError, Result};
use crate::manager::{PartitionManager, PartitionValue};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 可分区的记录
///
/// 按列名读写时间戳列，并报告某列在本次写入中是否被修改。
pub trait Partitionable {
    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>>;

    fn set_timestamp(&mut self, column: &str, value: DateTime<Utc>);

    /// 该列的值在本次写入中是否发生变化
    fn is_changed(&self, column: &str) -> bool;
}

/// 写入前确保分区存在的钩子
#[derive(Clone)]
pub struct PartitionHook {
    manager: Arc<dyn PartitionManager>,
    clock: fn() -> DateTime<Utc>,
}

impl PartitionHook {
    pub fn new(manager: Arc<dyn PartitionManager>) -> Self {
        Self {
            manager,
            clock: Utc::now,
        }
    }

    #[doc(hidden)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn manager(&self) -> &Arc<dyn PartitionManager> {
        &self.manager
    }

    /// 在写入前调用
    ///
    /// 分区键为 `created_at` / `updated_at` 且为空时填入当前时间；
    /// 分区键发生变化时同步确保覆盖它的分区存在。
    #[instrument(skip(self, record), fields(table = %self.manager.table_name()))]
    pub async fn before_persist<R: Partitionable + ?Sized>(&self, record: &mut R) -> Result<()> {
        let config = self.manager.config();
        let column = config.partition_key.as_str();

        let mut populated = false;
        if config.uses_timestamp_convention() && record.timestamp(column).is_none() {
            record.set_timestamp(column, (self.clock)());
            populated = true;
        }

        if !populated && !record.is_changed(column) {
            return Ok(());
        }

        let value = record.timestamp(column).ok_or_else(|| {
            PartitionError::InvalidInput(format!(
                "Partition key '{}' of '{}' was set to null",
                column, config.table_name
            ))
        })?;

        debug!(column, %value, "Partition key changed, ensuring coverage");
        self.manager
            .ensure_partition(&PartitionValue::Timestamp(value))
            .await
    }
}
