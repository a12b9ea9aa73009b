//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! PostgreSQL分区适配器实现
//!
//! 基于声明式分区（`PARTITION OF ... FOR VALUES FROM ... TO ...`）。

use crate::config::DatabaseConfig;
use crate::error::{PartitionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::common::{
    format_sql_timestamp, parse_overlap_error, validate_lowercase_identifier, validate_table_name,
};
use super::connection_string::redact_connection_string;
use super::naming::PartitionName;
use super::PartitionAdapter;

/// 默认schema，生成的DDL在该schema下不加限定前缀
pub const DEFAULT_SCHEMA: &str = "public";

/// 建立PostgreSQL连接池
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let url = config.url.expose_secret().to_string();
    let mut opt = ConnectOptions::new(url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    info!(url = %redact_connection_string(&url), "Connecting to PostgreSQL");

    Database::connect(opt)
        .await
        .map_err(|e| PartitionError::DatabaseError(e.to_string()))
}

/// PostgreSQL分区适配器
pub struct PostgresPartitionAdapter {
    table_name: String,
    schema: String,
    connection: Arc<DatabaseConnection>,
}

impl PostgresPartitionAdapter {
    /// 使用已有连接创建适配器
    pub fn new(connection: Arc<DatabaseConnection>, schema: &str, table_name: &str) -> Result<Self> {
        validate_lowercase_identifier(schema)?;
        validate_table_name(table_name)?;

        Ok(Self {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            connection,
        })
    }

    /// 按配置建立独立连接并创建适配器
    pub async fn connect(config: &DatabaseConfig, table_name: &str) -> Result<Self> {
        let connection = connect(config).await?;
        Self::new(Arc::new(connection), &config.schema, table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn qualified(&self, identifier: &str) -> String {
        if self.schema == DEFAULT_SCHEMA {
            identifier.to_string()
        } else {
            format!("{}.{}", self.schema, identifier)
        }
    }

    /// 拒绝不属于本表命名规则的分区名，防止拼接任意标识符
    fn ensure_owned_partition(&self, partition_name: &str) -> Result<()> {
        if PartitionName::matches_table(&self.table_name, partition_name) {
            Ok(())
        } else {
            Err(PartitionError::InvalidInput(format!(
                "'{}' is not a partition of table '{}'",
                partition_name, self.table_name
            )))
        }
    }

    pub fn create_partition_sql(
        &self,
        partition_name: &str,
        from: &DateTime<Utc>,
        to: &DateTime<Utc>,
    ) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} PARTITION OF {} FOR VALUES FROM ('{}') TO ('{}')",
            self.qualified(partition_name),
            self.qualified(&self.table_name),
            format_sql_timestamp(from),
            format_sql_timestamp(to)
        )
    }

    pub fn detach_partition_sql(&self, partition_name: &str) -> String {
        format!(
            "ALTER TABLE IF EXISTS {} DETACH PARTITION {}",
            self.qualified(&self.table_name),
            self.qualified(partition_name)
        )
    }

    pub fn drop_partition_sql(&self, partition_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified(partition_name))
    }

    /// 分区枚举语句
    ///
    /// `LIKE` 只做粗筛（下划线需要转义），最终由命名规则过滤。
    pub fn list_partitions_statement(&self) -> Statement {
        let pattern = format!("{}\\_p\\_%", self.table_name.replace('_', "\\_"));
        Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"SELECT c.relname::text AS relname
                 FROM pg_class c
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname = $1
                  AND c.relname LIKE $2
                  AND c.relkind = 'r'
                ORDER BY c.relname"#,
            [self.schema.clone().into(), pattern.into()],
        )
    }

    async fn execute(&self, partition_name: &str, sql: String) -> Result<()> {
        debug!(sql = %sql, "Executing partition DDL");

        let result = self
            .connection
            .execute(Statement::from_string(DatabaseBackend::Postgres, sql))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if let Some(conflicting) = parse_overlap_error(&message) {
                    warn!(
                        partition = partition_name,
                        conflicting = ?conflicting,
                        "Partition bounds overlap an existing partition"
                    );
                    Err(PartitionError::Overlap {
                        partition: partition_name.to_string(),
                        conflicting,
                        message,
                    })
                } else {
                    Err(PartitionError::SeaOrmError(e))
                }
            }
        }
    }
}

#[async_trait]
impl PartitionAdapter for PostgresPartitionAdapter {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn create_partition_by_range(
        &self,
        partition_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_owned_partition(partition_name)?;
        let sql = self.create_partition_sql(partition_name, &from, &to);
        self.execute(partition_name, sql).await
    }

    async fn list_partitions(&self) -> Result<Vec<String>> {
        let rows = self
            .connection
            .query_all(self.list_partitions_statement())
            .await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("", "relname")?;
            if PartitionName::matches_table(&self.table_name, &name) {
                names.push(name);
            } else {
                debug!(name = %name, "Ignoring table outside the partition naming scheme");
            }
        }

        debug!(table = %self.table_name, count = names.len(), "Listed partitions");
        Ok(names)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn detach_partition(&self, partition_name: &str) -> Result<()> {
        self.ensure_owned_partition(partition_name)?;
        let sql = self.detach_partition_sql(partition_name);
        self.execute(partition_name, sql).await
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn drop_partition(&self, partition_name: &str) -> Result<()> {
        self.ensure_owned_partition(partition_name)?;
        let sql = self.drop_partition_sql(partition_name);
        self.execute(partition_name, sql).await
    }
}
