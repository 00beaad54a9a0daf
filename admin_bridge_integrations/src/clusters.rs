use crate::error::{Result, ensure_positive};
use crate::schemas::ClusterSummary;
use crate::window::{
    Limit, LookbackWindow, Order, Selection, idle_seconds, seconds_between, seconds_to_hours,
};
use crate::workspace::{ClusterInfo, WorkspaceApi};
use chrono::{DateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ACTIVE_STATES: &[&str] = &["RUNNING", "RESIZING", "RESTARTING"];

fn default_min_duration_hours() -> f64 {
    8.0
}

fn default_lookback_hours() -> f64 {
    24.0
}

fn default_idle_hours() -> f64 {
    2.0
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListLongRunningClustersArgs {
    /// Minimum runtime in hours to be considered long-running (default: 8.0)
    #[serde(default = "default_min_duration_hours")]
    pub min_duration_hours: f64,
    /// How far back to look for cluster starts in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    /// Maximum number of results to return (default: 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListIdleClustersArgs {
    /// Minimum hours without activity to be considered idle (default: 2.0)
    #[serde(default = "default_idle_hours")]
    pub idle_hours: f64,
    /// Maximum number of results to return (default: 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Interactive and job cluster monitoring.
pub struct ClustersAdmin<W> {
    ws: Arc<W>,
}

impl<W: WorkspaceApi> ClustersAdmin<W> {
    pub fn new(ws: Arc<W>) -> Self {
        Self { ws }
    }

    /// Active clusters started inside the lookback window that have been up for at least
    /// `min_duration_hours`, longest first.
    pub async fn list_long_running_clusters(
        &self,
        min_duration_hours: f64,
        lookback_hours: f64,
        limit: i64,
    ) -> Result<Vec<ClusterSummary>> {
        ensure_positive("min_duration_hours", min_duration_hours)?;
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;
        let min_runtime_seconds = min_duration_hours * 3600.0;
        let now = window.end();

        info!(
            "Searching for clusters running > {}h in last {}h",
            min_duration_hours, lookback_hours
        );

        let clusters = self
            .detailed_clusters()
            .await
            .map_err(|e| e.context("list long-running clusters"))?;

        let result = Selection::from_records(clusters)
            .filter(|cluster| cluster.state_is(ACTIVE_STATES))
            .within(&window, |cluster| cluster.start_time)
            .filter_map(|cluster| {
                let runtime = seconds_between(cluster.start_time?, now);
                if runtime < min_runtime_seconds {
                    debug!(
                        "Cluster {} up for {:.0}s, below threshold",
                        cluster.cluster_id, runtime
                    );
                    return None;
                }
                let mut summary = summarize(&cluster, now);
                summary.is_long_running = true;
                summary.runtime_hours = Some(seconds_to_hours(runtime));
                Some((runtime, summary))
            })
            .rank_by(|(runtime, _)| *runtime, Order::Descending)
            .take(limit);

        info!("Found {} long-running clusters", result.len());
        Ok(result.into_iter().map(|(_, summary)| summary).collect())
    }

    /// Running clusters with no activity for at least `idle_hours`, idlest first.
    pub async fn list_idle_clusters(
        &self,
        idle_hours: f64,
        limit: i64,
    ) -> Result<Vec<ClusterSummary>> {
        ensure_positive("idle_hours", idle_hours)?;
        let limit = Limit::new(limit)?;
        let min_idle_seconds = idle_hours * 3600.0;
        let now = Utc::now();

        info!("Searching for clusters idle > {}h", idle_hours);

        let clusters = self
            .ws
            .list_clusters()
            .await
            .map_err(|e| e.context("list idle clusters"))?;

        let result = Selection::from_records(clusters)
            .filter(|cluster| cluster.state_is(&["RUNNING"]))
            .filter_map(|cluster| {
                let idle = idle_seconds(cluster.last_activity_time, cluster.start_time, now)?;
                if idle < min_idle_seconds {
                    return None;
                }
                let mut summary = summarize(&cluster, now);
                summary.idle_hours = Some(seconds_to_hours(idle));
                Some((idle, summary))
            })
            .rank_by(|(idle, _)| *idle, Order::Descending)
            .take(limit);

        info!("Found {} idle clusters", result.len());
        Ok(result.into_iter().map(|(_, summary)| summary).collect())
    }

    /// The list endpoint omits some fields, so each cluster is re-read individually.
    async fn detailed_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let listed = self.ws.list_clusters().await?;
        debug!("Found {} clusters", listed.len());

        let mut clusters = Vec::with_capacity(listed.len());
        for cluster in listed {
            clusters.push(self.ws.get_cluster(&cluster.cluster_id).await?);
        }
        Ok(clusters)
    }
}

fn summarize(cluster: &ClusterInfo, now: DateTime<Utc>) -> ClusterSummary {
    let runtime_hours = cluster
        .start_time
        .map(|start| seconds_between(start, now) / 3600.0);
    ClusterSummary {
        cluster_id: cluster.cluster_id.clone(),
        cluster_name: cluster.display_name(),
        state: cluster.state.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        creator: cluster.creator_user_name.clone(),
        start_time: cluster.start_time,
        driver_node_type: cluster.driver_node_type_id.clone(),
        node_type: cluster.node_type_id.clone(),
        cluster_policy_id: cluster.policy_id.clone(),
        last_activity_time: cluster.last_activity_time,
        is_long_running: runtime_hours.is_some_and(|h| h >= default_min_duration_hours()),
        runtime_hours: None,
        idle_hours: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_summary_flags_long_uptime() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 12, 0, 0).unwrap();
        let cluster = ClusterInfo {
            cluster_id: "0101-abc".into(),
            state: Some("RUNNING".into()),
            start_time: Some(now - Duration::hours(9)),
            ..Default::default()
        };
        let summary = summarize(&cluster, now);
        assert!(summary.is_long_running);
        assert_eq!(summary.cluster_name, "Cluster 0101-abc");
        assert_eq!(summary.runtime_hours, None);

        let fresh = ClusterInfo {
            start_time: Some(now - Duration::hours(1)),
            ..cluster
        };
        assert!(!summarize(&fresh, now).is_long_running);
    }

    #[test]
    fn test_args_defaults() {
        let args: ListIdleClustersArgs = serde_json::from_str("{}").unwrap();
        assert_eq!(args.idle_hours, 2.0);
        assert_eq!(args.limit, 50);
    }
}
