use crate::cli::StatusArgs;
use crate::manager::RetentionPolicy;
use crate::registry::{PartitionedTable, TableRegistry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TableStatus {
    table: String,
    partition_key: String,
    partition_period_secs: i64,
    retention: Option<String>,
    premake_count: u32,
    partitions: Vec<PartitionStatus>,
}

#[derive(Debug, Serialize)]
struct PartitionStatus {
    name: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

pub async fn execute(registry: &TableRegistry, args: &StatusArgs) -> Result<()> {
    let names = match &args.table {
        Some(table) => vec![table.clone()],
        None => registry.table_names(),
    };

    let mut statuses = Vec::with_capacity(names.len());
    for name in &names {
        let table = registry
            .get(name)
            .with_context(|| format!("Table '{}' not found", name))?;
        statuses.push(collect_status(&table).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("=== Partitioned Tables ===\n");
    if statuses.is_empty() {
        println!("No partitioned tables configured.");
        return Ok(());
    }

    for status in &statuses {
        print_table_status(status);
        println!();
    }
    Ok(())
}

async fn collect_status(table: &PartitionedTable) -> Result<TableStatus> {
    let config = table.config();
    let partitions = table
        .manager()
        .partitions()
        .await
        .with_context(|| format!("Failed to list partitions of '{}'", config.table_name))?;

    Ok(TableStatus {
        table: config.table_name.clone(),
        partition_key: config.partition_key.clone(),
        partition_period_secs: config.partition_period.num_seconds(),
        retention: config.retention.map(describe_retention),
        premake_count: config.premake_count,
        partitions: partitions
            .into_iter()
            .map(|p| PartitionStatus {
                from: p.from(),
                to: p.to(),
                name: p.into_string(),
            })
            .collect(),
    })
}

fn describe_retention(policy: RetentionPolicy) -> String {
    match policy {
        RetentionPolicy::Period(period) => format!("{}s", period.num_seconds()),
        RetentionPolicy::Count(count) => format!("{} partitions", count),
    }
}

fn print_table_status(status: &TableStatus) {
    println!("Table:      {}", status.table);
    println!("Key:        {}", status.partition_key);
    println!("Period:     {}s", status.partition_period_secs);
    println!(
        "Retention:  {}",
        status.retention.as_deref().unwrap_or("none")
    );
    println!("Partitions: {}", status.partitions.len());

    for partition in &status.partitions {
        println!(
            "  {}  [{} .. {})",
            partition.name,
            partition.from.to_rfc3339(),
            partition.to.to_rfc3339()
        );
    }
}
