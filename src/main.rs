//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分区维护命令行工具的入口点。

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    oxpartition::cli::run().await
}
