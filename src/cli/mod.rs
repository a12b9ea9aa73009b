//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了分区维护的命令行接口，供运维人员或外部调度器调用。

use crate::config::{Config, CONFIG_ENV};
use crate::registry::TableRegistry;
use crate::telemetry::init_tracing;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "oxpartition")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        env = CONFIG_ENV,
        default_value = "oxpartition.toml",
        help = "Path to the configuration file"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "status", about = "Show partitions of the configured tables")]
    Status(StatusArgs),

    #[command(name = "premake", about = "Create future partitions ahead of time")]
    Premake(PremakeArgs),

    #[command(name = "retain", about = "Detach and drop expired partitions")]
    Retain(RetainArgs),

    #[command(name = "maintain", about = "Premake and retain for every configured table")]
    Maintain,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, help = "Table name to query")]
    pub table: Option<String>,

    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct PremakeArgs {
    #[arg(short, long, help = "Table name")]
    pub table: String,

    #[arg(long, help = "Number of partitions (defaults to the table's premake_count)")]
    pub count: Option<u32>,

    #[arg(long, help = "Start instant in RFC 3339 (defaults to the latest coverage edge)")]
    pub from: Option<DateTime<Utc>>,
}

#[derive(Parser, Debug)]
pub struct RetainArgs {
    #[arg(short, long, help = "Table name")]
    pub table: String,

    #[command(flatten)]
    pub policy: RetainPolicyArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct RetainPolicyArgs {
    #[arg(long, help = "Remove partitions ending before this RFC 3339 instant")]
    pub before: Option<DateTime<Utc>>,

    #[arg(long, help = "Keep only the N most recent past partitions")]
    pub count: Option<usize>,
}

mod maintain;
mod premake;
mod retain;
mod status;

/// 加载配置、初始化日志并连接数据库
async fn open_registry(path: &Path) -> Result<TableRegistry> {
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    init_tracing("oxpartition", &config.global.log_level);

    TableRegistry::from_config(&config)
        .await
        .context("Failed to initialize partitioned tables")
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let registry = open_registry(&cli.config).await?;

    match &cli.command {
        Commands::Status(args) => status::execute(&registry, args).await,
        Commands::Premake(args) => premake::execute(&registry, args).await,
        Commands::Retain(args) => retain::execute(&registry, args).await,
        Commands::Maintain => maintain::execute(&registry).await,
    }
}
