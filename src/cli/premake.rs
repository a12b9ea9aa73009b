use crate::cli::PremakeArgs;
use crate::registry::TableRegistry;
use anyhow::{Context, Result};

pub async fn execute(registry: &TableRegistry, args: &PremakeArgs) -> Result<()> {
    let table = registry
        .get(&args.table)
        .with_context(|| format!("Table '{}' not found", args.table))?;
    let manager = table.time_range()?;
    let config = table.config();
    let count = args.count.unwrap_or(config.premake_count);

    println!("Premaking {} partitions for table: {}", count, args.table);
    let created = manager
        .premake_from(config.partition_period, count, args.from)
        .await
        .with_context(|| format!("Premake failed for table '{}'", args.table))?;

    for name in &created {
        println!("  + {}", name);
    }
    println!("\n✅ {} partitions ensured for table: {}", created.len(), args.table);

    Ok(())
}
