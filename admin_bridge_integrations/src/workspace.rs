use crate::error::Result;
use crate::window::{LookbackWindow, from_epoch_millis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

/// One SQL result row keyed by column name.
pub type Row = HashMap<String, Value>;

/// Read-only view of a Databricks workspace. Every admin type consumes data through this trait so
/// that tests can substitute an in-memory workspace.
pub trait WorkspaceApi: Send + Sync {
    fn list_jobs(&self) -> impl Future<Output = Result<Vec<JobSummary>>> + Send;

    /// Runs of one job whose start time lies in the window.
    fn list_runs(
        &self,
        job_id: i64,
        window: &LookbackWindow,
    ) -> impl Future<Output = Result<Vec<RunInfo>>> + Send;

    fn list_query_history(
        &self,
        window: &LookbackWindow,
    ) -> impl Future<Output = Result<Vec<QueryInfo>>> + Send;

    fn list_clusters(&self) -> impl Future<Output = Result<Vec<ClusterInfo>>> + Send;

    fn get_cluster(&self, cluster_id: &str) -> impl Future<Output = Result<ClusterInfo>> + Send;

    fn cluster_events(
        &self,
        cluster_id: &str,
        window: &LookbackWindow,
    ) -> impl Future<Output = Result<Vec<ClusterEvent>>> + Send;

    /// `object_type` is the REST path segment, e.g. `jobs` or `clusters`.
    fn get_permissions(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> impl Future<Output = Result<ObjectPermissions>> + Send;

    fn list_pipelines(&self) -> impl Future<Output = Result<Vec<PipelineSummary>>> + Send;

    fn get_pipeline(
        &self,
        pipeline_id: &str,
    ) -> impl Future<Output = Result<PipelineDetails>> + Send;

    fn list_warehouses(&self) -> impl Future<Output = Result<Vec<WarehouseInfo>>> + Send;

    fn table_exists(&self, full_name: &str) -> impl Future<Output = Result<bool>> + Send;

    fn execute_statement(
        &self,
        warehouse_id: &str,
        sql: &str,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobSummary {
    pub job_id: i64,
    #[serde(default)]
    pub settings: Option<JobSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobSettings {
    pub name: Option<String>,
}

impl JobSummary {
    pub fn display_name(&self) -> String {
        self.settings
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| format!("Job {}", self.job_id))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunInfo {
    pub run_id: i64,
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub state: Option<RunState>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunState {
    pub life_cycle_state: Option<String>,
    pub result_state: Option<String>,
    pub state_message: Option<String>,
}

impl RunInfo {
    pub fn life_cycle_state(&self) -> Option<&str> {
        self.state.as_ref()?.life_cycle_state.as_deref()
    }

    pub fn result_state(&self) -> Option<&str> {
        self.state.as_ref()?.result_state.as_deref()
    }

    /// Result state when the run has finished, otherwise the life-cycle state.
    pub fn overall_state(&self) -> String {
        self.result_state()
            .or(self.life_cycle_state())
            .unwrap_or("UNKNOWN")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryInfo {
    pub query_id: String,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "query_start_time_ms", deserialize_with = "timestamp_opt")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "query_end_time_ms", deserialize_with = "timestamp_opt")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub query_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClusterInfo {
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub last_activity_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub driver_node_type_id: Option<String>,
    #[serde(default)]
    pub node_type_id: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub num_workers: Option<u32>,
}

impl ClusterInfo {
    pub fn display_name(&self) -> String {
        self.cluster_name
            .clone()
            .unwrap_or_else(|| format!("Cluster {}", self.cluster_id))
    }

    pub fn state_is(&self, states: &[&str]) -> bool {
        self.state
            .as_deref()
            .is_some_and(|state| states.contains(&state))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClusterEvent {
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObjectPermissions {
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub access_control_list: Vec<AccessControl>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessControl {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub service_principal_name: Option<String>,
    #[serde(default)]
    pub all_permissions: Vec<PermissionGrant>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PermissionGrant {
    pub permission_level: Option<String>,
    #[serde(default)]
    pub inherited: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineSummary {
    pub pipeline_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineDetails {
    pub pipeline_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub spec: Option<PipelineSpec>,
    /// Newest first.
    #[serde(default)]
    pub latest_updates: Vec<UpdateStateInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub continuous: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateStateInfo {
    #[serde(default)]
    pub update_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl PipelineDetails {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Pipeline {}", self.pipeline_id))
    }

    pub fn is_continuous(&self) -> bool {
        self.spec
            .as_ref()
            .and_then(|s| s.continuous)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WarehouseInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cluster_size: Option<String>,
}

impl WarehouseInfo {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Warehouse {}", self.id))
    }

    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("RUNNING")
    }
}

/// String view of a row cell. Integral numbers render without a fractional part so ids survive.
pub fn row_str(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        other => Some(other.to_string()),
    }
}

pub fn row_f64(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn row_time(row: &Row, column: &str) -> Option<DateTime<Utc>> {
    row.get(column).and_then(parse_timestamp)
}

/// Cells holding `to_json(...)` output arrive as strings; decode them.
pub fn row_json(row: &Row, column: &str) -> Option<Value> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

/// Workspace APIs report timestamps as epoch milliseconds, sometimes quoted, and a few report
/// RFC 3339 strings. Zero means "not set".
fn timestamp_opt<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .filter(|ms| *ms > 0)
            .and_then(from_epoch_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return (ms > 0).then(|| from_epoch_millis(ms)).flatten();
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .map(|naive| naive.and_utc())
                })
                .or_else(|_| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .map(|naive| naive.and_utc())
                })
                .ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_run_timestamps_from_epoch_millis() {
        let run: RunInfo = serde_json::from_value(json!({
            "run_id": 11,
            "job_id": 1,
            "start_time": 1_700_000_000_000_i64,
            "end_time": 0,
            "state": {"life_cycle_state": "RUNNING"}
        }))
        .unwrap();
        assert_eq!(
            run.start_time,
            Some(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
        );
        assert_eq!(run.end_time, None);
        assert_eq!(run.overall_state(), "RUNNING");
    }

    #[test]
    fn test_pipeline_update_time_variants() {
        let details: PipelineDetails = serde_json::from_value(json!({
            "pipeline_id": "p1",
            "spec": {"continuous": true},
            "latest_updates": [
                {"update_id": "u2", "state": "RUNNING", "creation_time": "2024-12-15T10:00:00.000Z"},
                {"update_id": "u1", "state": "COMPLETED", "creation_time": "1734249600000"}
            ]
        }))
        .unwrap();
        assert!(details.is_continuous());
        assert_eq!(details.display_name(), "Pipeline p1");
        assert_eq!(
            details.latest_updates[0].creation_time,
            Some(Utc.with_ymd_and_hms(2024, 12, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(
            details.latest_updates[1].creation_time,
            Some(Utc.with_ymd_and_hms(2024, 12, 15, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_sql_timestamp_literal() {
        let ts = parse_timestamp(&json!("2024-12-15 09:30:00.123")).unwrap();
        assert_eq!(ts.timestamp_millis() % 1000, 123);
        assert!(parse_timestamp(&json!("not a time")).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }

    #[test]
    fn test_row_helpers() {
        let row: Row = serde_json::from_value(json!({
            "job_id": 123.0,
            "cost": "12.5",
            "tags": "{\"team\":\"a\"}",
            "missing": null
        }))
        .unwrap();
        assert_eq!(row_str(&row, "job_id").as_deref(), Some("123"));
        assert_eq!(row_f64(&row, "cost"), Some(12.5));
        assert_eq!(row_json(&row, "tags"), Some(json!({"team": "a"})));
        assert_eq!(row_str(&row, "missing"), None);
        assert_eq!(row_str(&row, "absent"), None);
    }
}
