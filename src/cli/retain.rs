use crate::cli::RetainArgs;
use crate::registry::TableRegistry;
use anyhow::{bail, Context, Result};

pub async fn execute(registry: &TableRegistry, args: &RetainArgs) -> Result<()> {
    let table = registry
        .get(&args.table)
        .with_context(|| format!("Table '{}' not found", args.table))?;
    let manager = table.time_range()?;

    let removed = match (args.policy.before, args.policy.count) {
        (Some(cutoff), None) => {
            println!(
                "Removing partitions of {} ending before {}",
                args.table,
                cutoff.to_rfc3339()
            );
            manager.retain_by_time(cutoff).await
        }
        (None, Some(count)) => {
            println!(
                "Keeping the {} most recent past partitions of {}",
                count, args.table
            );
            manager.retain_by_count(count).await
        }
        _ => bail!("Exactly one of --before and --count is required"),
    }
    .with_context(|| format!("Retention failed for table '{}'", args.table))?;

    for name in &removed {
        println!("  - {}", name);
    }
    println!("\n✅ {} partitions removed from table: {}", removed.len(), args.table);

    Ok(())
}
