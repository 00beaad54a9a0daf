use crate::error::{Result, ensure_positive};
use crate::schemas::JobRunSummary;
use crate::tables::resolve_warehouse;
use crate::window::{
    Limit, LookbackWindow, Order, Selection, duration_seconds, seconds_between, seconds_to_hours,
};
use crate::workspace::{JobSummary, Row, RunInfo, WorkspaceApi, row_f64, row_str, row_time};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const FAILED_RESULT_STATES: &[&str] = &["FAILED", "TIMEDOUT"];
const JOB_TIMELINE_TABLE: &str = "system.workflow.job_task_run_timeline";

fn default_min_duration_hours() -> f64 {
    4.0
}

fn default_lookback_hours() -> f64 {
    24.0
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListLongRunningJobsArgs {
    /// Minimum runtime in hours to be considered long-running (default: 4.0)
    #[serde(default = "default_min_duration_hours")]
    pub min_duration_hours: f64,
    /// How far back to search for runs in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    /// Maximum number of results to return (default: 20)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListFailedJobsArgs {
    /// How far back to search for failed runs in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    /// Maximum number of results to return (default: 20)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Job run monitoring. With a warehouse configured, runs are read from the workflow system
/// table first and the Jobs API is only walked when that query fails.
pub struct JobsAdmin<W> {
    ws: Arc<W>,
    warehouse_id: Option<String>,
}

impl<W: WorkspaceApi> JobsAdmin<W> {
    pub fn new(ws: Arc<W>) -> Self {
        Self {
            ws,
            warehouse_id: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse_id: Option<String>) -> Self {
        self.warehouse_id = warehouse_id.filter(|id| !id.trim().is_empty());
        self
    }

    /// Runs started in the lookback window that ran (or are still running) at least
    /// `min_duration_hours`, longest first.
    pub async fn list_long_running_jobs(
        &self,
        min_duration_hours: f64,
        lookback_hours: f64,
        limit: i64,
    ) -> Result<Vec<JobRunSummary>> {
        ensure_positive("min_duration_hours", min_duration_hours)?;
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;
        let min_duration_seconds = min_duration_hours * 3600.0;

        info!(
            "Searching for jobs running > {}h in last {}h",
            min_duration_hours, lookback_hours
        );

        if self.warehouse_id.is_some() {
            let condition = format!(
                "t.execution_duration >= {}",
                (min_duration_seconds * 1000.0).round() as i64
            );
            match self.timeline_rows(&window, &condition).await {
                Ok(rows) => {
                    let result = Selection::from_records(rows)
                        .within(&window, |row| row_time(row, "start_time"))
                        .filter_map(|row| timeline_summary(&row))
                        .filter(|summary| {
                            summary
                                .duration_seconds
                                .is_some_and(|d| d >= min_duration_seconds)
                        })
                        .rank_by(|summary| summary.duration_seconds, Order::Descending)
                        .take(limit);
                    info!("Found {} long-running job runs via system tables", result.len());
                    return Ok(result);
                }
                Err(e) => warn!("System table query failed, falling back to the Jobs API: {}", e),
            }
        }

        let runs = self
            .runs_in_window(&window)
            .await
            .map_err(|e| e.context("list long-running jobs"))?;

        let result = Selection::from_records(runs)
            .filter_map(|(job, run)| {
                let start = run.start_time?;
                let still_running = run.life_cycle_state() == Some("RUNNING");
                let Some(duration) = duration_seconds(start, run.end_time, still_running, window.end())
                else {
                    debug!(
                        "Run {} of job {} has no end time and is not running; skipping",
                        run.run_id, job.job_id
                    );
                    return None;
                };
                (duration >= min_duration_seconds).then(|| summarize(&job, &run, Some(duration)))
            })
            .rank_by(|summary| summary.duration_seconds, Order::Descending)
            .take(limit);

        info!("Found {} long-running job runs", result.len());
        Ok(result)
    }

    /// Runs in the lookback window that failed, timed out or hit an internal error, newest first.
    pub async fn list_failed_jobs(
        &self,
        lookback_hours: f64,
        limit: i64,
    ) -> Result<Vec<JobRunSummary>> {
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;

        info!("Searching for failed jobs in last {}h", lookback_hours);

        if self.warehouse_id.is_some() {
            let condition = "t.result_state IN ('FAILED', 'TIMEDOUT') \
                             OR t.life_cycle_state = 'INTERNAL_ERROR'";
            match self.timeline_rows(&window, condition).await {
                Ok(rows) => {
                    let result = Selection::from_records(rows)
                        .within(&window, |row| row_time(row, "start_time"))
                        .filter(|row| {
                            is_failed_state(
                                row_str(row, "result_state").as_deref(),
                                row_str(row, "life_cycle_state").as_deref(),
                            )
                        })
                        .filter_map(|row| timeline_summary(&row))
                        .rank_by(|summary| summary.start_time, Order::Descending)
                        .take(limit);
                    info!("Found {} failed job runs via system tables", result.len());
                    return Ok(result);
                }
                Err(e) => warn!("System table query failed, falling back to the Jobs API: {}", e),
            }
        }

        let runs = self
            .runs_in_window(&window)
            .await
            .map_err(|e| e.context("list failed jobs"))?;

        let result = Selection::from_records(runs)
            .filter(|(_, run)| is_failed(run))
            .map(|(job, run)| {
                let duration = run
                    .start_time
                    .zip(run.end_time)
                    .map(|(start, end)| seconds_between(start, end));
                summarize(&job, &run, duration)
            })
            .rank_by(|summary| summary.start_time, Order::Descending)
            .take(limit);

        info!("Found {} failed job runs", result.len());
        Ok(result)
    }

    async fn timeline_rows(&self, window: &LookbackWindow, condition: &str) -> Result<Vec<Row>> {
        let warehouse = resolve_warehouse(self.ws.as_ref(), self.warehouse_id.as_deref()).await?;
        info!("Using system tables (warehouse: {})", warehouse);
        let sql = format!(
            "SELECT t.job_id, t.job_name, t.run_id, t.result_state, t.life_cycle_state, \
             t.start_time, t.end_time, t.execution_duration AS duration_ms \
             FROM {} t WHERE t.start_time >= '{}' AND ({})",
            JOB_TIMELINE_TABLE,
            window.start_sql_literal(),
            condition
        );
        debug!("Executing SQL query: {}", sql);
        self.ws.execute_statement(&warehouse, &sql).await
    }

    async fn runs_in_window(&self, window: &LookbackWindow) -> Result<Vec<(JobSummary, RunInfo)>> {
        let jobs = self.ws.list_jobs().await?;
        debug!("Found {} jobs", jobs.len());

        let mut pairs = Vec::new();
        for job in jobs {
            let runs = self.ws.list_runs(job.job_id, window).await?;
            let runs = Selection::from_records(runs)
                .within(window, |run| run.start_time)
                .into_vec();
            pairs.extend(runs.into_iter().map(|run| (job.clone(), run)));
        }
        Ok(pairs)
    }
}

fn is_failed(run: &RunInfo) -> bool {
    is_failed_state(run.result_state(), run.life_cycle_state())
}

fn is_failed_state(result_state: Option<&str>, life_cycle_state: Option<&str>) -> bool {
    result_state.is_some_and(|state| FAILED_RESULT_STATES.contains(&state))
        || life_cycle_state == Some("INTERNAL_ERROR")
}

/// Summary of one system-table row. Rows without job or run ids are dropped.
fn timeline_summary(row: &Row) -> Option<JobRunSummary> {
    let job_id = row_str(row, "job_id")?.parse().ok()?;
    let run_id = row_str(row, "run_id")?.parse().ok()?;
    let result_state = row_str(row, "result_state");
    let life_cycle_state = row_str(row, "life_cycle_state");
    let duration = row_f64(row, "duration_ms").map(|ms| ms / 1000.0);
    Some(JobRunSummary {
        job_id,
        job_name: row_str(row, "job_name").unwrap_or_else(|| format!("Job {}", job_id)),
        run_id,
        state: result_state
            .or_else(|| life_cycle_state.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        life_cycle_state,
        start_time: row_time(row, "start_time"),
        end_time: row_time(row, "end_time"),
        duration_seconds: duration,
        duration_hours: duration.map(seconds_to_hours),
    })
}

fn summarize(job: &JobSummary, run: &RunInfo, duration: Option<f64>) -> JobRunSummary {
    JobRunSummary {
        job_id: run.job_id.unwrap_or(job.job_id),
        job_name: job.display_name(),
        run_id: run.run_id,
        state: run.overall_state(),
        life_cycle_state: run.life_cycle_state().map(str::to_string),
        start_time: run.start_time,
        end_time: run.end_time,
        duration_seconds: duration,
        duration_hours: duration.map(seconds_to_hours),
    }
}
