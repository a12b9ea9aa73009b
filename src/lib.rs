//! oxpartition - 时间范围分区管理库
//!
//! 按固定时间跨度管理PostgreSQL声明式分区：写入前按需创建覆盖分区，
//! 由外部调度器周期性预创建未来分区并清理过期分区。

#![doc(html_root_url = "https://docs.rs/oxpartition/0.1.0")]

pub use chrono;
pub use tokio;

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod registry;
pub mod telemetry;

// Re-export commonly used items
pub use config::Config;
pub use database::{PartitionAdapter, PartitionName, PartitionRange};
pub use error::{PartitionError, Result};
pub use lifecycle::{PartitionHook, Partitionable};
pub use manager::{
    PartitionConfig, PartitionManager, PartitionManagerFactory, PartitionValue, RetentionPolicy,
    TimeRangePartitionManager,
};
pub use registry::{PartitionedTable, TableRegistry};

/// oxpartition 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
