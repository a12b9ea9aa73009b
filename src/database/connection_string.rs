//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 连接字符串模块
//!
//! 提供PostgreSQL连接字符串的解析、验证和日志脱敏。

use crate::error::{PartitionError, Result};

/// PostgreSQL 连接字符串解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConnectionString {
    /// 数据库主机地址
    pub host: Option<String>,
    /// 数据库端口
    pub port: Option<u16>,
    /// 数据库名称
    pub database: Option<String>,
    /// 用户名
    pub username: Option<String>,
    /// 密码
    pub password: Option<String>,
    /// 连接参数
    pub params: Vec<(String, String)>,
}

impl ParsedConnectionString {
    /// 解析 `postgres://` 或 `postgresql://` 连接字符串
    pub fn parse(s: &str) -> Result<Self> {
        let without_prefix = strip_scheme(s).ok_or_else(|| {
            PartitionError::ConfigError(format!(
                "Unsupported connection string scheme: {}",
                redact_connection_string(s)
            ))
        })?;

        let (creds, mut host_port) = match without_prefix.rfind('@') {
            Some(at_pos) => (
                Some(&without_prefix[..at_pos]),
                &without_prefix[at_pos + 1..],
            ),
            None => (None, without_prefix),
        };

        let (username, password) = match creds {
            Some(creds) => match creds.split_once(':') {
                Some((user, pass)) => (non_empty(user), Some(pass.to_string())),
                None => (non_empty(creds), None),
            },
            None => (None, None),
        };

        let mut database = None;
        let mut params = Vec::new();
        if let Some(slash_pos) = host_port.find('/') {
            let after_slash = &host_port[slash_pos + 1..];
            let db_name = match after_slash.split_once('?') {
                Some((db, query)) => {
                    params = extract_params(query);
                    db
                }
                None => after_slash,
            };
            database = non_empty(db_name);
            host_port = &host_port[..slash_pos];
        } else if let Some((hp, query)) = host_port.split_once('?') {
            params = extract_params(query);
            host_port = hp;
        }

        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port_str)) => match port_str.parse::<u16>() {
                Ok(port) => (non_empty(host), Some(port)),
                Err(_) => {
                    return Err(PartitionError::ConfigError(format!(
                        "Invalid port '{}' in connection string",
                        port_str
                    )))
                }
            },
            None => (non_empty(host_port), None),
        };

        Ok(Self {
            host,
            port,
            database,
            username,
            password,
            params,
        })
    }
}

fn strip_scheme(s: &str) -> Option<&str> {
    s.strip_prefix("postgresql://")
        .or_else(|| s.strip_prefix("postgres://"))
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// 从查询字符串提取参数
fn extract_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 验证连接字符串
///
/// 分区DDL只支持PostgreSQL声明式分区，其他数据库直接拒绝。
pub fn validate_connection_string(s: &str) -> Result<()> {
    let parsed = ParsedConnectionString::parse(s)?;
    if parsed.host.is_none() {
        return Err(PartitionError::ConfigError(
            "Connection string must include a host".to_string(),
        ));
    }
    if parsed.database.is_none() {
        return Err(PartitionError::ConfigError(
            "Connection string must include a database name".to_string(),
        ));
    }
    Ok(())
}

/// 脱敏连接字符串
///
/// 把 `user:password@` 中的密码替换为 `****`，用于日志输出。
pub fn redact_connection_string(connection_string: &str) -> String {
    let scheme_end = match connection_string.find("://") {
        Some(pos) => pos + 3,
        None => return connection_string.to_string(),
    };
    let rest = &connection_string[scheme_end..];
    let Some(at_pos) = rest.rfind('@') else {
        return connection_string.to_string();
    };

    let creds = &rest[..at_pos];
    match creds.split_once(':') {
        Some((user, _)) => format!(
            "{}{}:****{}",
            &connection_string[..scheme_end],
            user,
            &rest[at_pos..]
        ),
        None => connection_string.to_string(),
    }
}
