//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了分区管理的错误类型和处理机制。

use thiserror::Error;

/// 分区管理错误类型枚举
///
/// 适配器与连接层的错误原样向上传播，本层不做重试
#[derive(Error, Debug)]
pub enum PartitionError {
    /// 新分区的边界与已有分区重叠，存储层拒绝创建
    #[error("Partition {partition} overlaps an existing partition: {message}")]
    Overlap {
        /// 尝试创建的分区名
        partition: String,
        /// 存储层报告的冲突分区名（如果能从错误信息中解析出来）
        conflicting: Option<String>,
        /// 存储层原始错误信息
        message: String,
    },

    /// 通过了命名规则过滤但无法解析的分区名，属于完整性错误
    #[error("Malformed partition name: {0}")]
    MalformedName(String),

    /// 非法输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 操作不支持
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 数据库连接错误
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 部分表的维护任务失败
    #[error("Maintenance error: {0}")]
    MaintenanceError(String),

    /// Sea-ORM数据库错误
    #[error("Sea-ORM error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PartitionError {
    /// 是否为分区重叠冲突
    pub fn is_overlap(&self) -> bool {
        matches!(self, PartitionError::Overlap { .. })
    }
}

/// 分区操作结果类型别名
pub type Result<T> = std::result::Result<T, PartitionError>;
