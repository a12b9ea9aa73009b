//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 活跃分区范围缓存
//!
//! 缓存内容总是恰好等于某一次分区枚举的结果：只整体替换，从不增量修改。

use crate::database::{PartitionName, PartitionRange};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// 活跃分区范围集合（无序）
#[derive(Debug, Clone, Default)]
pub struct ActiveRangeSet {
    ranges: Vec<PartitionRange>,
    populated: bool,
}

impl ActiveRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已经由一次枚举填充过
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// 用一次枚举的结果整体替换缓存
    pub fn replace(&mut self, ranges: Vec<PartitionRange>) {
        self.ranges = ranges;
        self.populated = true;
    }

    /// 解析分区名并整体替换缓存
    ///
    /// 任一名字解析失败时缓存保持不变并返回错误。
    pub fn replace_from_names<S: AsRef<str>>(&mut self, table: &str, names: &[S]) -> Result<()> {
        let ranges = names
            .iter()
            .map(|name| PartitionName::parse(table, name.as_ref()).map(|p| p.range()))
            .collect::<Result<Vec<_>>>()?;
        self.replace(ranges);
        Ok(())
    }

    /// 标记为未填充，下次查询时重建
    pub fn invalidate(&mut self) {
        self.ranges.clear();
        self.populated = false;
    }

    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.ranges.iter().any(|range| range.contains(instant))
    }

    pub fn ranges(&self) -> &[PartitionRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
