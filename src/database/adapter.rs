//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分区存储适配器trait定义

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 分区存储适配器trait
///
/// 把分区操作翻译成具体数据库的DDL。适配器是分区状态的唯一可信来源，
/// 管理器的缓存总是通过 [`PartitionAdapter::list_partitions`] 重建。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PartitionAdapter: Send + Sync {
    /// 按时间范围 `[from, to)` 创建分区
    async fn create_partition_by_range(
        &self,
        partition_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<()>;

    /// 列出所有符合命名规则的分区名
    async fn list_partitions(&self) -> Result<Vec<String>>;

    /// 从主表上分离分区（不删除数据）
    async fn detach_partition(&self, partition_name: &str) -> Result<()>;

    /// 删除分区表
    async fn drop_partition(&self, partition_name: &str) -> Result<()>;
}
