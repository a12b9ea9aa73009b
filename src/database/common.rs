//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了分区DDL生成的公共工具函数。

use crate::error::{PartitionError, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

/// PostgreSQL 标识符最大长度（NAMEDATALEN - 1）
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// PostgreSQL 报告分区重叠时的错误信息片段
pub const OVERLAP_MARKER: &str = "would overlap partition";

lazy_static! {
    static ref OVERLAP_RE: Regex =
        Regex::new(r#"would overlap partition "?([A-Za-z0-9_]+)"?"#).expect("valid pattern");
}

const RESERVED_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TABLE", "INDEX", "WHERE",
    "FROM", "JOIN", "UNION", "OR", "AND", "NOT", "NULL", "TRUE", "FALSE", "IS", "IN", "LIKE",
    "BETWEEN", "ORDER", "BY", "GROUP", "HAVING", "LIMIT", "OFFSET", "DISTINCT", "VIEW",
    "TRIGGER", "PARTITION", "DEFAULT", "USER",
];

/// 验证SQL标识符是否安全（防止SQL注入）
///
/// 只允许字母、数字、下划线，不能以数字开头，不能是保留关键字。
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(PartitionError::InvalidInput(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(PartitionError::InvalidInput(format!(
            "Identifier '{}' exceeds maximum length of {} characters",
            identifier, MAX_IDENTIFIER_LENGTH
        )));
    }

    let mut chars = identifier.chars();
    let first = chars
        .next()
        .ok_or_else(|| PartitionError::InvalidInput("Invalid identifier: empty".to_string()))?;

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(PartitionError::InvalidInput(format!(
            "Invalid identifier '{}': must start with a letter or underscore",
            identifier
        )));
    }

    if chars.any(|c| !c.is_ascii_alphanumeric() && c != '_') {
        return Err(PartitionError::InvalidInput(format!(
            "Invalid identifier '{}': only alphanumeric characters and underscores are allowed",
            identifier
        )));
    }

    if RESERVED_KEYWORDS.contains(&identifier.to_uppercase().as_str()) {
        return Err(PartitionError::InvalidInput(format!(
            "Invalid identifier '{}': reserved keyword",
            identifier
        )));
    }

    Ok(())
}

/// 未加引号的标识符会被 PostgreSQL 折叠为小写，分区枚举按原样匹配名字，
/// 因此表名和schema只接受小写
pub fn validate_lowercase_identifier(identifier: &str) -> Result<()> {
    validate_identifier(identifier)?;
    if identifier.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PartitionError::InvalidInput(format!(
            "Invalid identifier '{}': must be lower case",
            identifier
        )));
    }
    Ok(())
}

/// 分区表名要额外容纳 `_p_YYMMDD_HH_<10>_<10>` 后缀
pub fn validate_table_name(table_name: &str) -> Result<()> {
    validate_lowercase_identifier(table_name)?;
    let suffix_len = "_p_000000_00_0000000000_0000000000".len();
    if table_name.len() + suffix_len > MAX_IDENTIFIER_LENGTH {
        return Err(PartitionError::InvalidInput(format!(
            "Table name '{}' is too long: partition names would exceed {} characters",
            table_name, MAX_IDENTIFIER_LENGTH
        )));
    }
    Ok(())
}

/// 分区边界的SQL时间字面量（UTC）
pub fn format_sql_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 判断存储层错误信息是否为分区重叠，并尽量取出冲突分区名
///
/// 返回 `None` 表示不是重叠错误；`Some(None)` 表示是重叠但无法解析冲突分区名。
pub fn parse_overlap_error(message: &str) -> Option<Option<String>> {
    if !message.contains(OVERLAP_MARKER) {
        return None;
    }
    Some(
        OVERLAP_RE
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
    )
}
