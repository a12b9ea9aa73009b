//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分区管理器模块
//!
//! [`PartitionManager`] 是按分区键类型选择的多态接口，目前只有按时间范围分区的
//! [`TimeRangePartitionManager`] 一种实现。

use crate::database::{common::validate_identifier, PartitionAdapter, PartitionName};
use crate::error::{PartitionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

pub mod active_ranges;
pub mod time_range;

pub use active_ranges::ActiveRangeSet;
pub use time_range::TimeRangePartitionManager;

/// 约定由系统自动填充当前时间的分区键列
pub const TIMESTAMP_CONVENTION_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// 分区键类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// 时间戳列，按时间范围分区
    #[default]
    DateTime,
    /// 整数列（暂无分区策略）
    Integer,
}

/// 分区保留策略，两种方式互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// 保留上界距今不超过该时长的分区
    Period(Duration),
    /// 保留最近的N个历史分区（不含当前正在写入的分区）
    Count(usize),
}

/// 单表分区配置
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionConfig {
    /// 主表名
    pub table_name: String,
    /// 分区键列名
    pub partition_key: String,
    /// 分区键类型
    pub key_type: KeyType,
    /// 每个分区的时间跨度
    pub partition_period: Duration,
    /// 保留策略，`None` 表示不自动清理
    pub retention: Option<RetentionPolicy>,
    /// 维护任务每次预创建的分区数量
    pub premake_count: u32,
}

impl PartitionConfig {
    pub fn builder(table_name: &str) -> PartitionConfigBuilder {
        PartitionConfigBuilder {
            table_name: table_name.to_string(),
            partition_key: "created_at".to_string(),
            key_type: KeyType::DateTime,
            partition_period: Duration::days(1),
            retention: None,
            premake_count: 3,
        }
    }

    /// 分区键是否为 `created_at` / `updated_at` 约定列
    pub fn uses_timestamp_convention(&self) -> bool {
        TIMESTAMP_CONVENTION_COLUMNS.contains(&self.partition_key.as_str())
    }
}

/// [`PartitionConfig`] 构建器
#[derive(Debug, Clone)]
pub struct PartitionConfigBuilder {
    table_name: String,
    partition_key: String,
    key_type: KeyType,
    partition_period: Duration,
    retention: Option<RetentionPolicy>,
    premake_count: u32,
}

impl PartitionConfigBuilder {
    pub fn partition_key(mut self, column: &str) -> Self {
        self.partition_key = column.to_string();
        self
    }

    pub fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    pub fn partition_period(mut self, period: Duration) -> Self {
        self.partition_period = period;
        self
    }

    pub fn retention(mut self, retention: Option<RetentionPolicy>) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention_period(self, period: Duration) -> Self {
        self.retention(Some(RetentionPolicy::Period(period)))
    }

    pub fn retention_count(self, count: usize) -> Self {
        self.retention(Some(RetentionPolicy::Count(count)))
    }

    pub fn premake_count(mut self, count: u32) -> Self {
        self.premake_count = count;
        self
    }

    pub fn build(self) -> Result<PartitionConfig> {
        crate::database::common::validate_table_name(&self.table_name)?;
        validate_identifier(&self.partition_key)?;
        validate_period(self.partition_period)?;

        if let Some(RetentionPolicy::Period(period)) = self.retention {
            if period <= Duration::zero() {
                return Err(PartitionError::ConfigError(format!(
                    "Retention period for '{}' must be positive",
                    self.table_name
                )));
            }
        }

        Ok(PartitionConfig {
            table_name: self.table_name,
            partition_key: self.partition_key,
            key_type: self.key_type,
            partition_period: self.partition_period,
            retention: self.retention,
            premake_count: self.premake_count,
        })
    }
}

/// 分区跨度必须为正的整秒数
pub(crate) fn validate_period(period: Duration) -> Result<()> {
    if period <= Duration::zero() || period.subsec_nanos() != 0 {
        return Err(PartitionError::InvalidInput(format!(
            "Partition period must be a positive whole number of seconds, got {}",
            period
        )));
    }
    Ok(())
}

/// 分区键的值
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionValue {
    Timestamp(DateTime<Utc>),
}

impl From<DateTime<Utc>> for PartitionValue {
    fn from(value: DateTime<Utc>) -> Self {
        PartitionValue::Timestamp(value)
    }
}

/// 分区管理器trait
#[async_trait]
pub trait PartitionManager: Send + Sync {
    /// 单表分区配置
    fn config(&self) -> &PartitionConfig;

    fn table_name(&self) -> &str {
        &self.config().table_name
    }

    /// 确保存在覆盖该值的分区（不存在则创建）
    async fn ensure_partition(&self, value: &PartitionValue) -> Result<()>;

    /// 当前缓存的分区是否覆盖该值
    async fn covers(&self, value: &PartitionValue) -> Result<bool>;

    /// 按配置的分区跨度预创建未来分区，返回尝试创建的分区名
    async fn premake(&self, count: u32) -> Result<Vec<String>>;

    /// 按配置的保留策略清理过期分区，返回被删除的分区名
    async fn delete_expired_partitions(&self) -> Result<Vec<String>>;

    /// 枚举当前所有分区，按时间排序
    async fn partitions(&self) -> Result<Vec<PartitionName>>;

    /// 转换为 `Any`，用于向下转型到具体的管理器
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// 向下转型为按时间范围分区的管理器
pub fn time_range_manager(
    manager: Arc<dyn PartitionManager>,
) -> Result<Arc<TimeRangePartitionManager>> {
    let table = manager.table_name().to_string();
    manager
        .into_any_arc()
        .downcast::<TimeRangePartitionManager>()
        .map_err(|_| {
            PartitionError::NotSupported(format!(
                "Table '{}' is not managed by time range",
                table
            ))
        })
}

/// 分区管理器工厂
pub struct PartitionManagerFactory;

impl PartitionManagerFactory {
    /// 按分区键类型创建管理器
    pub fn create(
        config: PartitionConfig,
        adapter: Arc<dyn PartitionAdapter>,
    ) -> Result<Arc<dyn PartitionManager>> {
        match config.key_type {
            KeyType::DateTime => Ok(Arc::new(TimeRangePartitionManager::new(config, adapter))),
            KeyType::Integer => Err(PartitionError::NotSupported(format!(
                "No partition strategy for integer key '{}' on table '{}'",
                config.partition_key, config.table_name
            ))),
        }
    }
}
