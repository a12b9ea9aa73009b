use crate::registry::TableRegistry;
use anyhow::Result;

pub async fn execute(registry: &TableRegistry) -> Result<()> {
    println!("Running maintenance for {} tables...", registry.len());

    let reports = registry.run_maintenance().await?;
    for report in &reports {
        println!(
            "  {}: {} ensured, {} removed",
            report.table,
            report.created.len(),
            report.removed.len()
        );
    }

    println!("\n✅ Maintenance completed");
    Ok(())
}
