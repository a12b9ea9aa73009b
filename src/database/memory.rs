//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 内存分区适配器
//!
//! 在进程内模拟PostgreSQL声明式分区的行为：同名 `CREATE TABLE IF NOT EXISTS`
//! 为空操作，边界重叠被拒绝，分离后的分区表在删除前仍然可见。
//! 所有调用按顺序记录，便于测试和演练（dry run）检查DDL顺序。

use crate::error::{PartitionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::naming::{PartitionName, PartitionRange};
use super::PartitionAdapter;

/// 适配器调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Create {
        name: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    List,
    Detach(String),
    Drop(String),
}

#[derive(Debug, Clone)]
struct StoredTable {
    /// 不属于分区命名规则的表没有范围
    range: Option<PartitionRange>,
    attached: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, StoredTable>,
    calls: Vec<AdapterCall>,
    offline: bool,
}

/// 内存分区适配器
#[derive(Debug)]
pub struct MemoryPartitionAdapter {
    table_name: String,
    state: Mutex<MemoryState>,
}

impl MemoryPartitionAdapter {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 直接放入一张表（不记录调用），用于模拟目录中已有的对象
    ///
    /// 名字符合命名规则时按已挂载分区处理，否则作为无关表存在。
    pub fn insert_table(&self, name: &str) {
        let range = PartitionName::parse(&self.table_name, name)
            .ok()
            .map(|p| p.range());
        self.state().tables.insert(
            name.to_string(),
            StoredTable {
                range,
                attached: range.is_some(),
            },
        );
    }

    /// 模拟连接中断，之后的每个调用都返回 `DatabaseError`
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// 已记录的调用（按发生顺序）
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// 当前存在的所有表名（包括无关表和已分离未删除的分区）
    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    /// 当前挂载在主表上的分区
    pub fn attached_partitions(&self) -> Vec<String> {
        self.state()
            .tables
            .iter()
            .filter(|(_, t)| t.attached)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn check_online(state: &MemoryState) -> Result<()> {
        if state.offline {
            return Err(PartitionError::DatabaseError(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

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
}

#[async_trait]
impl PartitionAdapter for MemoryPartitionAdapter {
    async fn create_partition_by_range(
        &self,
        partition_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_owned_partition(partition_name)?;
        let range = PartitionRange::new(from, to)?;

        let mut state = self.state();
        Self::check_online(&state)?;
        state.calls.push(AdapterCall::Create {
            name: partition_name.to_string(),
            from,
            to,
        });

        if state.tables.contains_key(partition_name) {
            debug!(partition = partition_name, "relation already exists, skipping");
            return Ok(());
        }

        let conflicting = state.tables.iter().find(|(_, t)| {
            t.attached
                && t.range
                    .is_some_and(|r| range.start < r.end && r.start < range.end)
        });
        if let Some((existing, _)) = conflicting {
            return Err(PartitionError::Overlap {
                partition: partition_name.to_string(),
                conflicting: Some(existing.clone()),
                message: format!(
                    "partition \"{}\" would overlap partition \"{}\"",
                    partition_name, existing
                ),
            });
        }

        state.tables.insert(
            partition_name.to_string(),
            StoredTable {
                range: Some(range),
                attached: true,
            },
        );
        Ok(())
    }

    async fn list_partitions(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        Self::check_online(&state)?;
        state.calls.push(AdapterCall::List);

        Ok(state
            .tables
            .keys()
            .filter(|name| PartitionName::matches_table(&self.table_name, name))
            .cloned()
            .collect())
    }

    async fn detach_partition(&self, partition_name: &str) -> Result<()> {
        self.ensure_owned_partition(partition_name)?;

        let mut state = self.state();
        Self::check_online(&state)?;
        state.calls.push(AdapterCall::Detach(partition_name.to_string()));

        match state.tables.get_mut(partition_name) {
            Some(table) if table.attached => {
                table.attached = false;
                Ok(())
            }
            Some(_) => Err(PartitionError::DatabaseError(format!(
                "relation \"{}\" is not a partition of relation \"{}\"",
                partition_name, self.table_name
            ))),
            None => Err(PartitionError::DatabaseError(format!(
                "relation \"{}\" does not exist",
                partition_name
            ))),
        }
    }

    async fn drop_partition(&self, partition_name: &str) -> Result<()> {
        self.ensure_owned_partition(partition_name)?;

        let mut state = self.state();
        Self::check_online(&state)?;
        state.calls.push(AdapterCall::Drop(partition_name.to_string()));

        // DROP TABLE IF EXISTS
        state.tables.remove(partition_name);
        Ok(())
    }
}
