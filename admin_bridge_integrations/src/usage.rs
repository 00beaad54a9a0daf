//! Cost attribution: estimated top consumers, chargeback by dimension and budget tracking.

use crate::aggregate::{Dimension, UsageRecord, aggregate_costs, group_costs};
use crate::budget::{BudgetLine, DEFAULT_WARN_THRESHOLD, WarnThreshold, evaluate};
use crate::config::AdminBridgeConfig;
use crate::error::Result;
use crate::schemas::{BudgetStatus, Report, UsageEntry};
use crate::tables::{missing_tables, query_table, resolve_warehouse, sql_literal};
use crate::window::{Limit, LookbackWindow, Metric, Order, Selection, round2};
use crate::workspace::{ClusterEvent, ClusterInfo, Row, WarehouseInfo, WorkspaceApi, row_f64, row_str};
use chrono::{DateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// DBUs per node-hour assumed for all-purpose clusters.
const CLUSTER_DBU_PER_NODE_HOUR: f64 = 2.0;
/// DBUs per size-unit-hour assumed for SQL warehouses.
const WAREHOUSE_DBU_PER_UNIT_HOUR: f64 = 0.5;
const DEFAULT_WAREHOUSE_SIZE: &str = "2X-Small";
const DEFAULT_SIZE_MULTIPLIER: f64 = 4.0;

fn default_top_lookback_days() -> i64 {
    7
}

fn default_top_limit() -> i64 {
    20
}

fn default_chargeback_lookback_days() -> i64 {
    30
}

fn default_chargeback_limit() -> i64 {
    100
}

fn default_period_days() -> i64 {
    30
}

fn default_warn_threshold() -> f64 {
    DEFAULT_WARN_THRESHOLD
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TopCostCentersArgs {
    /// How far back to analyze in days (default: 7)
    #[serde(default = "default_top_lookback_days")]
    pub lookback_days: i64,
    /// Maximum number of results to return (default: 20)
    #[serde(default = "default_top_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CostByDimensionArgs {
    /// Dimension to group by: workspace, cluster, job, warehouse, or tag:<key> (e.g. tag:team)
    pub dimension: String,
    /// How far back to analyze in days (default: 30)
    #[serde(default = "default_chargeback_lookback_days")]
    pub lookback_days: i64,
    /// Maximum number of results to return (default: 100)
    #[serde(default = "default_chargeback_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BudgetStatusArgs {
    /// Budget dimension: workspace, cluster, job, warehouse, or a tag key such as project or team
    pub dimension: String,
    /// Budget period in days (default: 30)
    #[serde(default = "default_period_days")]
    pub period_days: i64,
    /// Utilization ratio at which a budget is flagged as warning, between 0 and 1 (default: 0.8)
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,
}

/// Usage, chargeback and budget reporting.
pub struct UsageAdmin<W> {
    ws: Arc<W>,
    usage_table: String,
    budget_table: String,
    warehouse_id: Option<String>,
}

impl<W: WorkspaceApi> UsageAdmin<W> {
    pub fn new(ws: Arc<W>, config: &AdminBridgeConfig) -> Self {
        Self {
            ws,
            usage_table: config.usage_table.clone(),
            budget_table: config.budget_table.clone(),
            warehouse_id: config.warehouse_id.clone(),
        }
    }

    /// Clusters and running warehouses ranked by estimated DBU consumption over the window.
    /// Costs are not reported; DBUs are rough estimates from uptime and size.
    pub async fn top_cost_centers(&self, lookback_days: i64, limit: i64) -> Result<Vec<UsageEntry>> {
        let window = LookbackWindow::days("lookback_days", lookback_days)?;
        let limit = Limit::new(limit)?;

        info!("Estimating top cost centers over last {} days", lookback_days);

        let mut entries = self
            .cluster_estimates(&window)
            .await
            .map_err(|e| e.context("estimate cluster usage"))?;
        let warehouses = self
            .ws
            .list_warehouses()
            .await
            .map_err(|e| e.context("list warehouses"))?;
        entries.extend(
            warehouses
                .iter()
                .filter(|w| w.is_running())
                .map(|w| warehouse_estimate(w, &window, lookback_days)),
        );

        let result = Selection::from_records(entries)
            .rank_by(|entry| entry.dbus.map(|m| m.value()), Order::Descending)
            .take(limit);

        info!("Found {} cost centers", result.len());
        Ok(result)
    }

    /// Summed cost and DBUs per dimension value from the usage table, most expensive first.
    pub async fn cost_by_dimension(
        &self,
        dimension: &str,
        lookback_days: i64,
        limit: i64,
    ) -> Result<Report<UsageEntry>> {
        let dimension = Dimension::parse(dimension)?;
        let window = LookbackWindow::days("lookback_days", lookback_days)?;
        let limit = Limit::new(limit)?;

        info!(
            "Aggregating cost by {} over last {} days",
            dimension.selector(),
            lookback_days
        );

        let sql = usage_sql(&self.usage_table, &window);
        let Some(rows) = query_table(
            self.ws.as_ref(),
            self.warehouse_id.as_deref(),
            &self.usage_table,
            &sql,
        )
        .await
        .map_err(|e| e.context("query usage data"))?
        else {
            return Ok(Report::unconfigured(vec![self.usage_table.clone()]));
        };

        let records = usage_records(&rows);
        let entries = aggregate_costs(&records, &dimension, &window, limit);
        info!("Aggregated {} rows into {} groups", records.len(), entries.len());
        Ok(Report::available(entries))
    }

    /// Spend against budget for every budget of the dimension, highest utilization first.
    pub async fn budget_status(
        &self,
        dimension: &str,
        period_days: i64,
        warn_threshold: f64,
    ) -> Result<Report<BudgetStatus>> {
        let dimension = Dimension::parse_budget(dimension)?;
        let window = LookbackWindow::days("period_days", period_days)?;
        let threshold = WarnThreshold::new(warn_threshold)?;

        info!(
            "Checking {} budgets over last {} days",
            dimension.budget_key(),
            period_days
        );

        let missing = missing_tables(
            self.ws.as_ref(),
            &[self.budget_table.as_str(), self.usage_table.as_str()],
        )
        .await
        .map_err(|e| e.context("query budget data"))?;
        if !missing.is_empty() {
            return Ok(Report::unconfigured(missing));
        }

        let warehouse = resolve_warehouse(self.ws.as_ref(), self.warehouse_id.as_deref()).await?;
        let budget_sql = format!(
            "SELECT dimension_value, budget_amount, period FROM {} WHERE dimension_type = {}",
            self.budget_table,
            sql_literal(dimension.budget_key())
        );
        let budget_rows = self
            .ws
            .execute_statement(&warehouse, &budget_sql)
            .await
            .map_err(|e| e.context("query budget data"))?;
        let usage_rows = self
            .ws
            .execute_statement(&warehouse, &usage_sql(&self.usage_table, &window))
            .await
            .map_err(|e| e.context("query usage data"))?;

        let budgets = budget_lines(&budget_rows);
        let actuals: HashMap<String, f64> =
            group_costs(&usage_records(&usage_rows), &dimension, &window)
                .into_iter()
                .map(|group| (group.value, group.cost))
                .collect();

        let statuses = evaluate(&budgets, &actuals, threshold);
        info!("Evaluated {} budgets", statuses.len());
        Ok(Report::available(statuses))
    }

    async fn cluster_estimates(&self, window: &LookbackWindow) -> Result<Vec<UsageEntry>> {
        let clusters = self.ws.list_clusters().await?;
        debug!("Estimating usage for {} clusters", clusters.len());

        let mut entries = Vec::new();
        for cluster in clusters {
            let events = self.ws.cluster_events(&cluster.cluster_id, window).await?;
            if let Some(entry) = cluster_estimate(&cluster, events, window) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

fn usage_sql(table: &str, window: &LookbackWindow) -> String {
    format!(
        "SELECT timestamp, workspace_id, cluster_id, job_id, warehouse_id, cost, dbu_consumed, to_json(tags) AS tags \
         FROM {} WHERE timestamp >= '{}'",
        table,
        window.start_sql_literal()
    )
}

fn usage_records(rows: &[Row]) -> Vec<UsageRecord> {
    rows.iter().map(UsageRecord::from_row).collect()
}

fn budget_lines(rows: &[Row]) -> Vec<BudgetLine> {
    rows.iter()
        .filter_map(|row| {
            let Some(value) = row_str(row, "dimension_value") else {
                debug!("Skipping budget row without dimension_value");
                return None;
            };
            Some(BudgetLine {
                dimension_value: value,
                budget_amount: row_f64(row, "budget_amount").unwrap_or(0.0),
            })
        })
        .collect()
}

/// Hours the cluster was up inside the window, from its start/terminate events. A span still
/// open at the end of the event stream runs until the end of the window.
fn cluster_runtime_hours(mut events: Vec<ClusterEvent>, window_end: DateTime<Utc>) -> f64 {
    events.sort_by_key(|e| e.timestamp);

    let mut total_seconds = 0.0;
    let mut started: Option<DateTime<Utc>> = None;
    for event in events {
        let Some(ts) = event.timestamp else {
            continue;
        };
        match event.event_type.as_deref() {
            Some("STARTING") => {
                started.get_or_insert(ts);
            }
            Some("TERMINATING") | Some("TERMINATED") => {
                if let Some(start) = started.take() {
                    total_seconds += (ts - start).num_milliseconds() as f64 / 1000.0;
                }
            }
            _ => {}
        }
    }
    if let Some(start) = started {
        total_seconds += (window_end - start).num_milliseconds() as f64 / 1000.0;
    }
    total_seconds / 3600.0
}

fn cluster_estimate(
    cluster: &ClusterInfo,
    events: Vec<ClusterEvent>,
    window: &LookbackWindow,
) -> Option<UsageEntry> {
    let hours = cluster_runtime_hours(events, window.end());
    if hours <= 0.0 {
        return None;
    }
    let workers = match cluster.num_workers {
        Some(n) if n > 0 => n,
        _ => 1,
    };
    let dbus = hours * (1.0 + workers as f64) * CLUSTER_DBU_PER_NODE_HOUR;
    Some(UsageEntry {
        scope: "cluster".to_string(),
        name: cluster.display_name(),
        start_time: window.start(),
        end_time: window.end(),
        cost: None,
        dbus: Some(Metric::Estimated(round2(dbus))),
    })
}

fn size_multiplier(size: &str) -> f64 {
    match size {
        "2X-Small" => 1.0,
        "X-Small" => 2.0,
        "Small" => 4.0,
        "Medium" => 8.0,
        "Large" => 16.0,
        "X-Large" => 32.0,
        "2X-Large" => 64.0,
        _ => DEFAULT_SIZE_MULTIPLIER,
    }
}

/// Assumes the warehouse ran for the whole window.
fn warehouse_estimate(warehouse: &WarehouseInfo, window: &LookbackWindow, days: i64) -> UsageEntry {
    let size = warehouse
        .cluster_size
        .as_deref()
        .unwrap_or(DEFAULT_WAREHOUSE_SIZE);
    let dbus = days as f64 * 24.0 * size_multiplier(size) * WAREHOUSE_DBU_PER_UNIT_HOUR;
    UsageEntry {
        scope: "warehouse".to_string(),
        name: warehouse.display_name(),
        start_time: window.start(),
        end_time: window.end(),
        cost: None,
        dbus: Some(Metric::Estimated(round2(dbus))),
    }
}
