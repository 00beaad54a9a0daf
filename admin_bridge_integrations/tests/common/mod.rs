//! In-memory workspace shared by the admin integration tests.
//!
//! Records are plain wire types so tests describe data the way the REST API returns it.
#![allow(dead_code)]

use admin_bridge_integrations::error::{AdminBridgeError, Result};
use admin_bridge_integrations::window::LookbackWindow;
use admin_bridge_integrations::workspace::{
    ClusterEvent, ClusterInfo, JobSummary, ObjectPermissions, PipelineDetails, PipelineSummary,
    QueryInfo, Row, RunInfo, WarehouseInfo, WorkspaceApi,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeWorkspace {
    pub jobs: Vec<JobSummary>,
    pub runs: HashMap<i64, Vec<RunInfo>>,
    pub queries: Vec<QueryInfo>,
    pub clusters: Vec<ClusterInfo>,
    pub cluster_events: HashMap<String, Vec<ClusterEvent>>,
    /// Keyed by (object type path segment, object id).
    pub permissions: HashMap<(String, String), ObjectPermissions>,
    pub pipelines: Vec<PipelineDetails>,
    pub warehouses: Vec<WarehouseInfo>,
    /// Existing tables and the rows a `SELECT ... FROM <table>` returns.
    pub tables: HashMap<String, Vec<Row>>,
    pub executed: Mutex<Vec<String>>,
    /// Methods that fail with the given error instead of answering.
    pub failures: HashMap<&'static str, fn() -> AdminBridgeError>,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().map(|sql| sql.clone()).unwrap_or_default()
    }

    pub fn with_running_warehouse(mut self) -> Self {
        self.warehouses.push(WarehouseInfo {
            id: "wh-1".into(),
            name: Some("shared".into()),
            state: Some("RUNNING".into()),
            cluster_size: Some("Small".into()),
        });
        self
    }

    pub fn failing(mut self, method: &'static str, error: fn() -> AdminBridgeError) -> Self {
        self.failures.insert(method, error);
        self
    }

    fn check(&self, method: &str) -> Result<()> {
        match self.failures.get(method) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> AdminBridgeError {
        AdminBridgeError::ResourceNotFound(format!("{} does not exist", what))
    }
}

impl WorkspaceApi for FakeWorkspace {
    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        self.check("list_jobs")?;
        Ok(self.jobs.clone())
    }

    async fn list_runs(&self, job_id: i64, _window: &LookbackWindow) -> Result<Vec<RunInfo>> {
        self.check("list_runs")?;
        Ok(self.runs.get(&job_id).cloned().unwrap_or_default())
    }

    async fn list_query_history(&self, _window: &LookbackWindow) -> Result<Vec<QueryInfo>> {
        self.check("list_query_history")?;
        Ok(self.queries.clone())
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        self.check("list_clusters")?;
        Ok(self.clusters.clone())
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.check("get_cluster")?;
        self.clusters
            .iter()
            .find(|c| c.cluster_id == cluster_id)
            .cloned()
            .ok_or_else(|| Self::not_found(cluster_id))
    }

    async fn cluster_events(
        &self,
        cluster_id: &str,
        _window: &LookbackWindow,
    ) -> Result<Vec<ClusterEvent>> {
        self.check("cluster_events")?;
        Ok(self
            .cluster_events
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_permissions(&self, object_type: &str, object_id: &str) -> Result<ObjectPermissions> {
        self.check("get_permissions")?;
        self.permissions
            .get(&(object_type.to_string(), object_id.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found(&format!("{}/{}", object_type, object_id)))
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        self.check("list_pipelines")?;
        Ok(self
            .pipelines
            .iter()
            .map(|p| PipelineSummary {
                pipeline_id: p.pipeline_id.clone(),
                name: p.name.clone(),
                state: p.state.clone(),
            })
            .collect())
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<PipelineDetails> {
        self.check("get_pipeline")?;
        self.pipelines
            .iter()
            .find(|p| p.pipeline_id == pipeline_id)
            .cloned()
            .ok_or_else(|| Self::not_found(pipeline_id))
    }

    async fn list_warehouses(&self) -> Result<Vec<WarehouseInfo>> {
        self.check("list_warehouses")?;
        Ok(self.warehouses.clone())
    }

    async fn table_exists(&self, full_name: &str) -> Result<bool> {
        self.check("table_exists")?;
        Ok(self.tables.contains_key(full_name))
    }

    async fn execute_statement(&self, _warehouse_id: &str, sql: &str) -> Result<Vec<Row>> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }
        self.check("execute_statement")?;
        let rows = self
            .tables
            .iter()
            .find(|(name, _)| sql.contains(&format!("FROM {} ", name)))
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| AdminBridgeError::remote(format!("no table matches statement: {}", sql)))?;
        Ok(rows)
    }
}

pub fn hours_ago(hours: f64) -> DateTime<Utc> {
    Utc::now() - Duration::milliseconds((hours * 3_600_000.0) as i64)
}

/// Build a row from (column, value) pairs.
pub fn row(cells: &[(&str, Value)]) -> Row {
    cells
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

/// Timestamp formatted the way SQL warehouses return it.
pub fn sql_time(ts: DateTime<Utc>) -> Value {
    Value::String(ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}
