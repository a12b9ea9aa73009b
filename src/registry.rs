//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分区表注册表，按表名持有每张表的分区管理器。

use crate::config::Config;
use crate::database::PartitionAdapterFactory;
use crate::error::{PartitionError, Result};
use crate::lifecycle::PartitionHook;
use crate::manager::{
    time_range_manager, PartitionConfig, PartitionManager, PartitionManagerFactory,
    TimeRangePartitionManager,
};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 单张分区表
pub struct PartitionedTable {
    manager: Arc<dyn PartitionManager>,
}

impl PartitionedTable {
    pub fn new(manager: Arc<dyn PartitionManager>) -> Self {
        Self { manager }
    }

    pub fn config(&self) -> &PartitionConfig {
        self.manager.config()
    }

    pub fn manager(&self) -> &Arc<dyn PartitionManager> {
        &self.manager
    }

    /// 按时间范围分区的管理器，用于指定起点或截止时间的维护操作
    pub fn time_range(&self) -> Result<Arc<TimeRangePartitionManager>> {
        time_range_manager(self.manager.clone())
    }

    /// 供写入路径使用的钩子
    pub fn hook(&self) -> PartitionHook {
        PartitionHook::new(self.manager.clone())
    }

    /// 按配置的数量预创建未来分区
    pub async fn premake(&self) -> Result<Vec<String>> {
        self.manager.premake(self.config().premake_count).await
    }

    /// 按配置的保留策略清理过期分区
    pub async fn delete_expired_partitions(&self) -> Result<Vec<String>> {
        self.manager.delete_expired_partitions().await
    }
}

/// 单张表一次维护的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableMaintenance {
    pub table: String,
    pub created: Vec<String>,
    pub removed: Vec<String>,
}

/// 分区表注册表
#[derive(Default)]
pub struct TableRegistry {
    tables: DashMap<String, Arc<PartitionedTable>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置连接数据库并为每张表创建管理器
    #[instrument(skip(config), level = "info", fields(table_count = config.tables.len()))]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate().map_err(PartitionError::ConfigError)?;

        let factory = PartitionAdapterFactory::connect(&config.database).await?;
        let registry = Self::new();

        for partition_config in config.partition_configs()? {
            let adapter = factory.adapter_for(&partition_config.table_name)?;
            let manager = PartitionManagerFactory::create(partition_config, adapter)?;
            registry.register(manager);
        }

        info!("Registered {} partitioned tables", registry.len());
        Ok(registry)
    }

    /// 注册一张表，同名表会被替换
    pub fn register(&self, manager: Arc<dyn PartitionManager>) -> Arc<PartitionedTable> {
        let table = Arc::new(PartitionedTable::new(manager));
        self.tables
            .insert(table.config().table_name.clone(), table.clone());
        table
    }

    pub fn get(&self, table_name: &str) -> Result<Arc<PartitionedTable>> {
        self.tables
            .get(table_name)
            .map(|r| r.value().clone())
            .ok_or_else(|| {
                PartitionError::ConfigError(format!("Table '{}' is not registered", table_name))
            })
    }

    /// 已注册的表名，按字母排序
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// 对每张表依次预创建并清理分区
    ///
    /// 某张表失败不影响其他表，所有失败最后合并为一个错误返回。
    #[instrument(skip(self), level = "info")]
    pub async fn run_maintenance(&self) -> Result<Vec<TableMaintenance>> {
        let mut reports = Vec::new();
        let mut errors = Vec::new();

        for name in self.table_names() {
            let table = self.get(&name)?;
            info!("Running partition maintenance for table: {}", name);

            let mut report = TableMaintenance {
                table: name.clone(),
                ..Default::default()
            };

            match table.premake().await {
                Ok(created) => report.created = created,
                Err(e) => {
                    warn!("Premake failed for table {}: {}", name, e);
                    errors.push(format!("{} (premake): {}", name, e));
                }
            }

            match table.delete_expired_partitions().await {
                Ok(removed) => report.removed = removed,
                Err(e) => {
                    warn!("Retention failed for table {}: {}", name, e);
                    errors.push(format!("{} (retain): {}", name, e));
                }
            }

            reports.push(report);
        }

        if errors.is_empty() {
            info!("Partition maintenance finished for {} tables", reports.len());
            Ok(reports)
        } else {
            Err(PartitionError::MaintenanceError(format!(
                "Maintenance failed for some tables: {}",
                errors.join(", ")
            )))
        }
    }
}
