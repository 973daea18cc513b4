use std::path::Path;

use anyhow::{Context, Result};

use crate::model::InventoryRow;

/// Flushes all accumulated rows to the inventory CSV in one pass. Headers
/// and column order come from the serde shape of [`InventoryRow`].
pub fn write_inventory(path: &Path, rows: &[InventoryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write inventory row for {}", row.relative_path))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}
