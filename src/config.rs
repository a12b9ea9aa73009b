//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了分区管理的配置结构和解析逻辑。

use crate::database::{common::validate_table_name, connection_string, DatabaseType};
use crate::error::{PartitionError, Result};
use crate::manager::{KeyType, PartitionConfig, RetentionPolicy};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "OXPARTITION_CONFIG";

/// 单个分区时间跨度的上限（秒）：一年
const MAX_PARTITION_PERIOD_SECS: u64 = 366 * 86400;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tables: HashMap<String, TableConfig>,
}

/// 全局配置
///
/// 各表未单独配置时使用这里的默认值
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 日志过滤表达式（`RUST_LOG` 语法）
    pub log_level: String,
    /// 默认分区跨度（秒）
    pub partition_period_secs: u64,
    /// 默认预创建分区数量
    pub premake_count: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            partition_period_secs: 86400,
            premake_count: 3,
        }
    }
}

/// 数据库连接配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 连接字符串（`postgres://...`，或 `memory:` 用于演练）
    pub url: SecretString,
    /// 分区所在schema
    pub schema: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: SecretString::new("postgres://localhost:5432/postgres".to_string().into()),
            schema: "public".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 5,
            idle_timeout_secs: 8,
        }
    }
}

/// 分区表配置
///
/// `retention_period_secs` 与 `retention_partition_count` 只能二选一，
/// 都不设置时不自动清理分区。
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct TableConfig {
    /// 分区键列名
    pub partition_key: String,
    /// 分区键类型
    pub key_type: KeyType,
    /// 分区跨度（秒），覆盖全局配置
    pub partition_period_secs: Option<u64>,
    /// 按时间保留：保留上界距今不超过该时长的分区（秒）
    pub retention_period_secs: Option<u64>,
    /// 按数量保留：保留最近的N个历史分区
    pub retention_partition_count: Option<u32>,
    /// 预创建分区数量，覆盖全局配置
    pub premake_count: Option<u32>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            partition_key: "created_at".to_string(),
            key_type: KeyType::DateTime,
            partition_period_secs: None,
            retention_period_secs: None,
            retention_partition_count: None,
            premake_count: None,
        }
    }
}

impl TableConfig {
    /// 生成单表的显式分区配置
    pub fn to_partition_config(
        &self,
        table_name: &str,
        global: &GlobalConfig,
    ) -> Result<PartitionConfig> {
        let period_secs = self
            .partition_period_secs
            .unwrap_or(global.partition_period_secs);

        let retention = match (self.retention_period_secs, self.retention_partition_count) {
            (Some(_), Some(_)) => {
                return Err(PartitionError::ConfigError(format!(
                    "Table '{}' sets both retention_period_secs and retention_partition_count",
                    table_name
                )))
            }
            (Some(secs), None) => Some(RetentionPolicy::Period(seconds(secs)?)),
            (None, Some(count)) => Some(RetentionPolicy::Count(count as usize)),
            (None, None) => None,
        };

        PartitionConfig::builder(table_name)
            .partition_key(&self.partition_key)
            .key_type(self.key_type)
            .partition_period(seconds(period_secs)?)
            .retention(retention)
            .premake_count(self.premake_count.unwrap_or(global.premake_count))
            .build()
    }
}

fn seconds(secs: u64) -> Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| PartitionError::ConfigError(format!("Duration {}s is out of range", secs)))
}

impl Config {
    /// 从TOML字符串解析配置
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| PartitionError::ConfigError(e.to_string()))?;
        config.validate().map_err(PartitionError::ConfigError)?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 生成所有表的分区配置，按表名排序
    pub fn partition_configs(&self) -> Result<Vec<PartitionConfig>> {
        let mut names: Vec<&String> = self.tables.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| self.tables[name].to_partition_config(name, &self.global))
            .collect()
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.global.partition_period_secs == 0 {
            return Err("Global partition_period_secs cannot be zero".to_string());
        }

        if self.global.partition_period_secs > MAX_PARTITION_PERIOD_SECS {
            return Err("Global partition_period_secs cannot exceed one year".to_string());
        }

        if self.global.premake_count > 1000 {
            return Err("Global premake_count cannot exceed 1000".to_string());
        }

        let url = self.database.url.expose_secret();
        match DatabaseType::from_url(url).map_err(|e| e.to_string())? {
            DatabaseType::PostgreSQL => {
                connection_string::validate_connection_string(url).map_err(|e| e.to_string())?
            }
            DatabaseType::Memory => {}
        }

        if self.database.max_connections == 0 {
            return Err("Database max_connections cannot be zero".to_string());
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(format!(
                "Database min_connections ({}) must be <= max_connections ({})",
                self.database.min_connections, self.database.max_connections
            ));
        }

        for (name, table) in &self.tables {
            validate_table_name(name).map_err(|e| format!("Table '{}': {}", name, e))?;

            if let Some(period) = table.partition_period_secs {
                if period == 0 {
                    return Err(format!("Table '{}' partition_period_secs cannot be zero", name));
                }
                if period > MAX_PARTITION_PERIOD_SECS {
                    return Err(format!(
                        "Table '{}' partition_period_secs cannot exceed one year",
                        name
                    ));
                }
            }

            if table.retention_period_secs.is_some() && table.retention_partition_count.is_some() {
                return Err(format!(
                    "Table '{}' can set only one of retention_period_secs and retention_partition_count",
                    name
                ));
            }

            if table.retention_period_secs == Some(0) {
                return Err(format!("Table '{}' retention_period_secs cannot be zero", name));
            }

            if table.key_type != KeyType::DateTime {
                return Err(format!(
                    "Table '{}' key_type {:?} has no partition strategy",
                    name, table.key_type
                ));
            }
        }

        Ok(())
    }
}
