use crate::error::{Result, ensure_positive};
use crate::schemas::PipelineStatus;
use crate::window::{Limit, LookbackWindow, Metric, Order, Selection, proxy_lag_seconds};
use crate::workspace::{PipelineDetails, UpdateStateInfo, WorkspaceApi};
use chrono::{DateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_max_lag_seconds() -> f64 {
    600.0
}

fn default_lookback_hours() -> f64 {
    24.0
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListLaggingPipelinesArgs {
    /// Lag in seconds above which a pipeline is reported (default: 600.0)
    #[serde(default = "default_max_lag_seconds")]
    pub max_lag_seconds: f64,
    /// Maximum number of results to return (default: 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListFailedPipelinesArgs {
    /// How far back to search for failed updates in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    /// Maximum number of results to return (default: 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Delta Live Tables / Lakeflow pipeline health.
pub struct PipelinesAdmin<W> {
    ws: Arc<W>,
}

impl<W: WorkspaceApi> PipelinesAdmin<W> {
    pub fn new(ws: Arc<W>) -> Self {
        Self { ws }
    }

    /// Continuous pipelines whose running update is older than `max_lag_seconds`. The lag is
    /// estimated from the update's creation time, not read from streaming metrics.
    pub async fn list_lagging_pipelines(
        &self,
        max_lag_seconds: f64,
        limit: i64,
    ) -> Result<Vec<PipelineStatus>> {
        ensure_positive("max_lag_seconds", max_lag_seconds)?;
        let limit = Limit::new(limit)?;
        let now = Utc::now();

        info!("Searching for pipelines lagging > {}s", max_lag_seconds);

        let pipelines = self
            .detailed_pipelines()
            .await
            .map_err(|e| e.context("list lagging pipelines"))?;

        let result = Selection::from_records(pipelines)
            .filter_map(|details| {
                let lag = estimated_lag(&details, now)?;
                if lag.value() <= max_lag_seconds {
                    return None;
                }
                Some(PipelineStatus {
                    state: details.state.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
                    last_update_time: details.latest_updates.first().and_then(|u| u.creation_time),
                    lag_seconds: Some(lag),
                    last_error: None,
                    name: details.display_name(),
                    pipeline_id: details.pipeline_id,
                })
            })
            .rank_by(|status| status.lag_seconds.map(|lag| lag.value()), Order::Descending)
            .take(limit);

        info!("Found {} lagging pipelines", result.len());
        Ok(result)
    }

    /// Pipelines whose most recent failure falls inside the window, newest failure first.
    pub async fn list_failed_pipelines(
        &self,
        lookback_hours: f64,
        limit: i64,
    ) -> Result<Vec<PipelineStatus>> {
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;

        info!("Searching for failed pipelines in last {}h", lookback_hours);

        let pipelines = self
            .detailed_pipelines()
            .await
            .map_err(|e| e.context("list failed pipelines"))?;

        let result = Selection::from_records(pipelines)
            .filter_map(|details| failure_status(&details, &window))
            .rank_by(|status| status.last_update_time, Order::Descending)
            .take(limit);

        info!("Found {} failed pipelines", result.len());
        Ok(result)
    }

    async fn detailed_pipelines(&self) -> Result<Vec<PipelineDetails>> {
        let listed = self.ws.list_pipelines().await?;
        debug!("Found {} pipelines", listed.len());

        let mut pipelines = Vec::with_capacity(listed.len());
        for pipeline in listed {
            pipelines.push(self.ws.get_pipeline(&pipeline.pipeline_id).await?);
        }
        Ok(pipelines)
    }
}

/// Time since the running update of a continuous pipeline was created.
fn estimated_lag(details: &PipelineDetails, now: DateTime<Utc>) -> Option<Metric> {
    if !details.is_continuous() {
        return None;
    }
    let latest = details.latest_updates.first()?;
    if latest.state.as_deref() != Some("RUNNING") {
        return None;
    }
    latest
        .creation_time
        .map(|created| proxy_lag_seconds(created, now))
}

fn is_failed_update(update: &UpdateStateInfo, cause: Option<&str>) -> bool {
    match update.state.as_deref() {
        Some("FAILED") => true,
        Some("STOPPING") => cause.is_some_and(|c| c.to_lowercase().contains("error")),
        _ => false,
    }
}

/// Status built from the newest failed update inside the window, if any.
fn failure_status(details: &PipelineDetails, window: &LookbackWindow) -> Option<PipelineStatus> {
    let cause = details.cause.as_deref();
    let failed = details
        .latest_updates
        .iter()
        .filter(|update| update.creation_time.is_some_and(|ts| window.contains(ts)))
        .find(|update| is_failed_update(update, cause))?;

    let last_error = details.cause.clone().or_else(|| {
        details
            .latest_updates
            .first()
            .and_then(|u| u.state_message.clone())
    });
    debug!(
        "Pipeline {} failed in update {:?}",
        details.pipeline_id, failed.update_id
    );
    Some(PipelineStatus {
        pipeline_id: details.pipeline_id.clone(),
        name: details.display_name(),
        state: failed.state.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        last_update_time: failed.creation_time,
        lag_seconds: None,
        last_error,
    })
}
