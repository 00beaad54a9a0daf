//! Reads from configurable workspace tables through a SQL warehouse.

use crate::error::{AdminBridgeError, Result};
use crate::workspace::{Row, WorkspaceApi};
use log::{info, warn};

/// Pick the configured warehouse, or the first running one.
pub async fn resolve_warehouse<W: WorkspaceApi>(ws: &W, configured: Option<&str>) -> Result<String> {
    if let Some(id) = configured.filter(|id| !id.trim().is_empty()) {
        return Ok(id.to_string());
    }

    let warehouses = ws.list_warehouses().await?;
    if warehouses.is_empty() {
        return Err(AdminBridgeError::remote("No SQL warehouses available"));
    }
    let warehouse = warehouses
        .into_iter()
        .find(|w| w.is_running())
        .ok_or_else(|| AdminBridgeError::remote("No running SQL warehouse found"))?;

    info!(
        "Using warehouse: {} (ID: {})",
        warehouse.display_name(),
        warehouse.id
    );
    Ok(warehouse.id)
}

/// Run `sql` against `table` when the table exists. `Ok(None)` means the table is missing; the
/// caller reports that as an unconfigured source rather than an error.
pub async fn query_table<W: WorkspaceApi>(
    ws: &W,
    warehouse_id: Option<&str>,
    table: &str,
    sql: &str,
) -> Result<Option<Vec<Row>>> {
    if !ws.table_exists(table).await? {
        warn!(
            "Table {} does not exist; returning an empty result. Configure the table name to enable this query.",
            table
        );
        return Ok(None);
    }
    let warehouse = resolve_warehouse(ws, warehouse_id).await?;
    let rows = ws.execute_statement(&warehouse, sql).await?;
    Ok(Some(rows))
}

/// Names from `tables` that do not exist in the workspace, in input order.
pub async fn missing_tables<W: WorkspaceApi>(ws: &W, tables: &[&str]) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for table in tables {
        if !ws.table_exists(table).await? {
            warn!("Table {} does not exist", table);
            missing.push(table.to_string());
        }
    }
    Ok(missing)
}

/// SQL string literal with embedded quotes escaped.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("team"), "'team'");
        assert_eq!(sql_literal("o'brien"), "'o\\'brien'");
    }
}
