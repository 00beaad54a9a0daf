//! Flat, JSON-serializable records returned by the admin operations.

use crate::ToolResultDisplay;
use crate::budget::BudgetLabel;
use crate::window::Metric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunSummary {
    pub job_id: i64,
    pub job_name: String,
    pub run_id: i64,
    /// Result state when finished, otherwise the life-cycle state.
    pub state: String,
    pub life_cycle_state: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub duration_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub query_id: String,
    pub warehouse_id: Option<String>,
    pub user_name: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub sql_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuerySummary {
    pub user_name: String,
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub avg_duration_seconds: f64,
    pub max_duration_seconds: f64,
    pub min_duration_seconds: f64,
    pub total_duration_seconds: f64,
    /// Percent of all queries that failed or were canceled.
    pub failure_rate: f64,
    pub warehouses_used: Vec<String>,
    pub time_window_start: DateTime<Utc>,
    pub time_window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub cluster_name: String,
    pub state: String,
    pub creator: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub driver_node_type: Option<String>,
    pub node_type: Option<String>,
    pub cluster_policy_id: Option<String>,
    pub last_activity_time: Option<DateTime<Utc>>,
    pub is_long_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Group,
    ServicePrincipal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub object_type: String,
    pub object_id: String,
    pub principal: String,
    pub principal_type: PrincipalType,
    pub permission_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// `cluster`, `warehouse`, `workspace`, `job` or `tag`.
    pub scope: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub cost: Option<f64>,
    pub dbus: Option<Metric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub dimension_value: String,
    pub actual_cost: f64,
    pub budget_amount: f64,
    /// `actual / budget`. `None` when the budget is zero and spend is positive.
    pub utilization: Option<f64>,
    pub utilization_pct: Option<f64>,
    pub status: BudgetLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_time: DateTime<Utc>,
    pub service_name: String,
    pub event_type: String,
    pub user_name: Option<String>,
    pub source_ip: Option<String>,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub pipeline_id: String,
    pub name: String,
    pub state: String,
    pub last_update_time: Option<DateTime<Utc>>,
    pub lag_seconds: Option<Metric>,
    pub last_error: Option<String>,
}

/// Whether the table behind a report could be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Available,
    Unconfigured { tables: Vec<String> },
}

impl SourceStatus {
    pub fn note(&self) -> Option<String> {
        match self {
            Self::Available => None,
            Self::Unconfigured { tables } => Some(format!(
                "Note: table(s) {} not found; result is empty because the data source is not configured, not because nothing happened.",
                tables.join(", ")
            )),
        }
    }
}

/// Records read from a workspace table, plus whether that table exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<T> {
    pub records: Vec<T>,
    pub source: SourceStatus,
}

impl<T> Report<T> {
    pub fn available(records: Vec<T>) -> Self {
        Self {
            records,
            source: SourceStatus::Available,
        }
    }

    pub fn unconfigured(tables: Vec<String>) -> Self {
        Self {
            records: Vec::new(),
            source: SourceStatus::Unconfigured { tables },
        }
    }

    pub fn note(&self) -> Option<String> {
        self.source.note()
    }
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {}", e))
}

impl<T: Serialize> ToolResultDisplay for Vec<T> {
    fn display(&self) -> String {
        to_pretty_json(self)
    }
}

impl<T: Serialize> ToolResultDisplay for Report<T> {
    fn display(&self) -> String {
        to_pretty_json(&self.records)
    }
}

impl ToolResultDisplay for UserQuerySummary {
    fn display(&self) -> String {
        to_pretty_json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_usage_entry_marks_estimated_dbus() {
        let start = Utc.with_ymd_and_hms(2024, 12, 8, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap();
        let entry = UsageEntry {
            scope: "warehouse".to_string(),
            name: "bi".to_string(),
            start_time: start,
            end_time: end,
            cost: None,
            dbus: Some(Metric::Estimated(336.0)),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["dbus"], json!({"kind": "estimated", "value": 336.0}));
        assert_eq!(value["cost"], json!(null));
    }

    #[test]
    fn test_report_display_and_note() {
        let report: Report<UsageEntry> = Report::unconfigured(vec!["billing.usage_events".into()]);
        assert_eq!(report.display(), "[]");
        assert!(report.note().unwrap().contains("billing.usage_events"));
        assert!(Report::available(vec![1, 2]).note().is_none());
    }

    #[test]
    fn test_principal_type_labels() {
        assert_eq!(
            serde_json::to_value(PrincipalType::ServicePrincipal).unwrap(),
            json!("service_principal")
        );
    }
}
