use crate::error::{Result, ensure_non_empty};
use crate::schemas::{QueryHistoryEntry, UserQuerySummary};
use crate::window::{Limit, LookbackWindow, Order, Selection, round2, seconds_between};
use crate::workspace::{QueryInfo, WorkspaceApi};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

fn default_lookback_hours() -> f64 {
    24.0
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TopSlowestQueriesArgs {
    /// How far back to search for queries in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    /// Maximum number of results to return (default: 20)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UserQuerySummaryArgs {
    /// Username or email address of the user to analyze
    pub user_name: String,
    /// How far back to analyze in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
}

/// SQL warehouse query history analysis.
pub struct DbsqlAdmin<W> {
    ws: Arc<W>,
}

impl<W: WorkspaceApi> DbsqlAdmin<W> {
    pub fn new(ws: Arc<W>) -> Self {
        Self { ws }
    }

    pub async fn top_slowest_queries(
        &self,
        lookback_hours: f64,
        limit: i64,
    ) -> Result<Vec<QueryHistoryEntry>> {
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;

        info!("Searching for slowest queries in last {}h", lookback_hours);

        let history = self
            .ws
            .list_query_history(&window)
            .await
            .map_err(|e| e.context("list query history"))?;

        let result = Selection::from_records(history)
            .within(&window, |q| q.start_time)
            .filter_map(|query| {
                let duration = completed_duration(&query)?;
                Some(QueryHistoryEntry {
                    query_id: query.query_id,
                    warehouse_id: query.warehouse_id,
                    user_name: query.user_name,
                    status: query.status,
                    start_time: query.start_time,
                    end_time: query.end_time,
                    duration_seconds: Some(duration),
                    sql_text: query.query_text,
                })
            })
            .rank_by(|entry| entry.duration_seconds, Order::Descending)
            .take(limit);

        info!("Found {} slow queries", result.len());
        Ok(result)
    }

    pub async fn user_query_summary(
        &self,
        user_name: &str,
        lookback_hours: f64,
    ) -> Result<UserQuerySummary> {
        let user_name = ensure_non_empty("user_name", user_name)?;
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;

        info!(
            "Summarizing queries for user {} in last {}h",
            user_name, lookback_hours
        );

        let history = self
            .ws
            .list_query_history(&window)
            .await
            .map_err(|e| e.context("get query summary"))?;

        let queries = Selection::from_records(history)
            .within(&window, |q| q.start_time)
            .filter(|q| q.user_name.as_deref() == Some(user_name))
            .into_vec();

        let summary = summarize_user(user_name, &queries, &window);
        info!(
            "User {} summary: {} queries, {:.1}% failure rate",
            user_name, summary.total_queries, summary.failure_rate
        );
        Ok(summary)
    }
}

/// Duration of a query that has both endpoints and took measurable time.
fn completed_duration(query: &QueryInfo) -> Option<f64> {
    let duration = seconds_between(query.start_time?, query.end_time?);
    (duration > 0.0).then_some(duration)
}

fn summarize_user(user_name: &str, queries: &[QueryInfo], window: &LookbackWindow) -> UserQuerySummary {
    let mut successful = 0;
    let mut failed = 0;
    let mut warehouses = BTreeSet::new();
    let mut durations = Vec::new();

    for query in queries {
        match query.status.as_deref() {
            Some("FINISHED") => successful += 1,
            Some("FAILED") | Some("CANCELED") => failed += 1,
            _ => {}
        }
        if let Some(warehouse) = &query.warehouse_id {
            warehouses.insert(warehouse.clone());
        }
        if let Some(duration) = completed_duration(query) {
            durations.push(duration);
        }
    }

    let total = queries.len();
    let total_duration: f64 = durations.iter().sum();
    let avg = if durations.is_empty() {
        0.0
    } else {
        total_duration / durations.len() as f64
    };
    let max = durations.iter().copied().fold(None, |acc: Option<f64>, d| {
        Some(acc.map_or(d, |a| a.max(d)))
    });
    let min = durations.iter().copied().fold(None, |acc: Option<f64>, d| {
        Some(acc.map_or(d, |a| a.min(d)))
    });
    let failure_rate = if total > 0 {
        failed as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    UserQuerySummary {
        user_name: user_name.to_string(),
        total_queries: total,
        successful_queries: successful,
        failed_queries: failed,
        avg_duration_seconds: round2(avg),
        max_duration_seconds: round2(max.unwrap_or(0.0)),
        min_duration_seconds: round2(min.unwrap_or(0.0)),
        total_duration_seconds: round2(total_duration),
        failure_rate: round2(failure_rate),
        warehouses_used: warehouses.into_iter().collect(),
        time_window_start: window.start(),
        time_window_end: window.end(),
    }
}
