//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分区命名规则
//!
//! 分区名格式：`{table}_p_{YYMMDD}_{HH}_{unix_from}_{unix_to}`。
//! 日期/小时片段仅供运维人员阅读，范围边界只取末尾两个十位纪元秒字段。
//! 所有字段定长补零，因此同一张表的分区名按字典序排序即按时间排序。

use crate::error::{PartitionError, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// 分区名中表名之后的固定标记
pub const PARTITION_MARKER: &str = "p";

/// 纪元秒字段的上限（十位数字）
const MAX_EPOCH_SECONDS: i64 = 9_999_999_999;

lazy_static! {
    static ref PARTITION_NAME_RE: Regex = Regex::new(
        r"^(?P<table>[A-Za-z_][A-Za-z0-9_]*)_p_(?P<date>\d{6})_(?P<hour>\d{2})_(?P<from>\d{10})_(?P<to>\d{10})$"
    )
    .expect("partition name pattern is valid");
}

/// 半开时间区间 `[start, end)`，UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PartitionRange {
    /// 创建区间，要求 `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(PartitionError::InvalidInput(format!(
                "Partition range start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// 区间是否包含给定时刻
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// 已解析的分区名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionName {
    table: String,
    name: String,
    range: PartitionRange,
}

impl PartitionName {
    /// 根据表名和时间边界生成分区名
    ///
    /// 相同输入总是得到相同的名字；边界按整秒截断。
    pub fn build(table: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        let unix_from = checked_epoch(from)?;
        let unix_to = checked_epoch(to)?;
        let range = PartitionRange::new(epoch_to_time(unix_from)?, epoch_to_time(unix_to)?)?;

        let readable_from = range.start.format("%y%m%d_%H");
        let name = format!(
            "{}_{}_{}_{:010}_{:010}",
            table, PARTITION_MARKER, readable_from, unix_from, unix_to
        );

        Ok(Self {
            table: table.to_string(),
            name,
            range,
        })
    }

    /// 名字是否符合指定表的分区命名规则
    ///
    /// 仅共享前缀的其他表（如 `events_archive_p_...` 之于 `events`）不算匹配。
    pub fn matches_table(table: &str, name: &str) -> bool {
        PARTITION_NAME_RE
            .captures(name)
            .and_then(|caps| caps.name("table"))
            .is_some_and(|t| t.as_str() == table)
    }

    /// 解析分区名
    ///
    /// 不符合命名规则或边界无效的名字返回 `MalformedName`。
    pub fn parse(table: &str, name: &str) -> Result<Self> {
        let malformed = || PartitionError::MalformedName(name.to_string());

        let caps = PARTITION_NAME_RE.captures(name).ok_or_else(malformed)?;
        if caps.name("table").map(|t| t.as_str()) != Some(table) {
            return Err(malformed());
        }

        let unix_from = caps
            .name("from")
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let unix_to = caps
            .name("to")
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(malformed)?;

        let start = epoch_to_time(unix_from).map_err(|_| malformed())?;
        let end = epoch_to_time(unix_to).map_err(|_| malformed())?;
        let range = PartitionRange::new(start, end).map_err(|_| malformed())?;

        Ok(Self {
            table: table.to_string(),
            name: name.to_string(),
            range,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn range(&self) -> PartitionRange {
        self.range
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.range.start
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.range.end
    }

    pub fn into_string(self) -> String {
        self.name
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for PartitionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl PartialOrd for PartitionName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartitionName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

fn checked_epoch(instant: DateTime<Utc>) -> Result<i64> {
    let secs = instant.timestamp();
    if !(0..=MAX_EPOCH_SECONDS).contains(&secs) {
        return Err(PartitionError::InvalidInput(format!(
            "Partition boundary {} is outside the encodable epoch range",
            instant
        )));
    }
    Ok(secs)
}

fn epoch_to_time(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        PartitionError::InvalidInput(format!("Epoch seconds {} out of range", secs))
    })
}
