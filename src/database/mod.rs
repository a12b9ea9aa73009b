//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 数据库分区存储模块
//!
//! 提供分区命名规则、存储适配器trait以及PostgreSQL和内存实现。

use crate::config::DatabaseConfig;
use crate::error::{PartitionError, Result};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod adapter;
pub mod common;
pub mod connection_string;
pub mod memory;
pub mod naming;
pub mod postgresql;

pub use adapter::PartitionAdapter;
pub use connection_string::{
    redact_connection_string, validate_connection_string, ParsedConnectionString,
};
pub use memory::{AdapterCall, MemoryPartitionAdapter};
pub use naming::{PartitionName, PartitionRange};
pub use postgresql::PostgresPartitionAdapter;

/// 数据库类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    /// 进程内存储，用于测试和演练
    Memory,
}

impl DatabaseType {
    /// 从URL字符串解析数据库类型
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("memory:") {
            Ok(DatabaseType::Memory)
        } else {
            Err(PartitionError::NotSupported(format!(
                "Unsupported database URL: {}",
                redact_connection_string(url)
            )))
        }
    }
}

/// 分区适配器工厂
///
/// 同一个数据库的多张表共享一个连接池。
pub enum PartitionAdapterFactory {
    Postgres {
        connection: Arc<DatabaseConnection>,
        schema: String,
    },
    Memory,
}

impl PartitionAdapterFactory {
    /// 按配置建立连接
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        match DatabaseType::from_url(config.url.expose_secret())? {
            DatabaseType::PostgreSQL => {
                let connection = postgresql::connect(config).await?;
                Ok(Self::Postgres {
                    connection: Arc::new(connection),
                    schema: config.schema.clone(),
                })
            }
            DatabaseType::Memory => Ok(Self::Memory),
        }
    }

    /// 为指定表创建适配器
    pub fn adapter_for(&self, table_name: &str) -> Result<Arc<dyn PartitionAdapter>> {
        match self {
            Self::Postgres { connection, schema } => Ok(Arc::new(PostgresPartitionAdapter::new(
                connection.clone(),
                schema,
                table_name,
            )?)),
            Self::Memory => {
                common::validate_table_name(table_name)?;
                Ok(Arc::new(MemoryPartitionAdapter::new(table_name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_url() {
        assert_eq!(
            DatabaseType::from_url("postgres://localhost/db").unwrap(),
            DatabaseType::PostgreSQL
        );
        assert_eq!(
            DatabaseType::from_url("postgresql://localhost/db").unwrap(),
            DatabaseType::PostgreSQL
        );
        assert_eq!(
            DatabaseType::from_url("memory:").unwrap(),
            DatabaseType::Memory
        );
        assert!(DatabaseType::from_url("mysql://localhost/db").is_err());
    }

    #[test]
    fn test_memory_factory_validates_table_names() {
        let factory = PartitionAdapterFactory::Memory;
        assert!(factory.adapter_for("events").is_ok());
        assert!(factory.adapter_for("events;--").is_err());
    }
}
