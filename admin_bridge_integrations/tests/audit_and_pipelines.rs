mod common;

use admin_bridge_integrations::workspace::{PipelineDetails, PipelineSpec, Row, UpdateStateInfo};
use admin_bridge_integrations::{AdminBridgeConfig, AuditAdmin, PipelinesAdmin, SourceStatus};
use common::{FakeWorkspace, hours_ago, row, sql_time};
use serde_json::{Value, json};

fn audit_row(hours: f64, service: &str, action: &str, user: &str, status: i64, params: Value) -> Row {
    row(&[
        ("event_time", sql_time(hours_ago(hours))),
        ("service_name", json!(service)),
        ("action_name", json!(action)),
        ("user_email", json!(user)),
        ("source_ip_address", json!("10.0.0.8")),
        ("request_params", json!(params.to_string())),
        ("status_code", json!(status.to_string())),
    ])
}

fn audit_workspace() -> FakeWorkspace {
    let mut ws = FakeWorkspace::new().with_running_warehouse();
    ws.tables.insert(
        "system.access.audit".into(),
        vec![
            audit_row(3.0, "accounts", "login", "mallory@example.com", 401, json!({})),
            audit_row(1.0, "accounts", "tokenLogin", "bot@example.com", 403, json!({})),
            audit_row(2.0, "accounts", "login", "alice@example.com", 200, json!({})),
            audit_row(40.0, "accounts", "login", "old@example.com", 401, json!({})),
            audit_row(
                5.0,
                "groups",
                "addPrincipalToGroup",
                "admin@example.com",
                200,
                json!({"group_name": "data-eng"}),
            ),
            audit_row(
                4.0,
                "groups",
                "updateGroup",
                "admin@example.com",
                200,
                json!({"group_name": "workspace-admins"}),
            ),
            audit_row(6.0, "clusters", "create", "alice@example.com", 200, json!({})),
        ],
    );
    ws
}

#[tokio::test]
async fn test_failed_logins_newest_first() {
    let admin = AuditAdmin::new(audit_workspace().into_arc(), &AdminBridgeConfig::default());

    let report = admin.failed_logins(24.0, 100).await.unwrap();
    let users: Vec<Option<&str>> = report
        .records
        .iter()
        .map(|e| e.user_name.as_deref())
        .collect();
    assert_eq!(
        users,
        vec![Some("bot@example.com"), Some("mallory@example.com")]
    );
    assert_eq!(report.records[1].source_ip.as_deref(), Some("10.0.0.8"));
    assert_eq!(report.records[1].event_type, "login");
}

#[tokio::test]
async fn test_recent_admin_changes() {
    let admin = AuditAdmin::new(audit_workspace().into_arc(), &AdminBridgeConfig::default());

    let report = admin.recent_admin_changes(24.0, 100).await.unwrap();
    let actions: Vec<&str> = report
        .records
        .iter()
        .map(|e| e.event_type.as_str())
        .collect();
    assert_eq!(actions, vec!["updateGroup", "addPrincipalToGroup"]);
    let details = report.records[1].details.as_ref().unwrap();
    assert_eq!(details["request_params"]["group_name"], json!("data-eng"));

    let limited = admin.recent_admin_changes(24.0, 1).await.unwrap();
    assert_eq!(limited.records.len(), 1);
}

#[tokio::test]
async fn test_audit_table_missing() {
    let admin = AuditAdmin::new(FakeWorkspace::new().into_arc(), &AdminBridgeConfig::default());

    let report = admin.failed_logins(24.0, 100).await.unwrap();
    assert!(report.records.is_empty());
    assert!(matches!(report.source, SourceStatus::Unconfigured { .. }));

    let err = admin.recent_admin_changes(24.0, -5).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

fn update(state: &str, hours: f64, message: Option<&str>) -> UpdateStateInfo {
    UpdateStateInfo {
        update_id: Some(format!("u-{}", hours)),
        state: Some(state.to_string()),
        creation_time: Some(hours_ago(hours)),
        state_message: message.map(str::to_string),
    }
}

fn pipeline(
    id: &str,
    continuous: bool,
    cause: Option<&str>,
    updates: Vec<UpdateStateInfo>,
) -> PipelineDetails {
    PipelineDetails {
        pipeline_id: id.to_string(),
        name: Some(format!("{}-pipeline", id)),
        state: Some("RUNNING".into()),
        cause: cause.map(str::to_string),
        spec: Some(PipelineSpec {
            continuous: Some(continuous),
        }),
        latest_updates: updates,
    }
}

fn pipeline_workspace() -> FakeWorkspace {
    let mut ws = FakeWorkspace::new();
    ws.pipelines = vec![
        // lag 1h
        pipeline("p-stream", true, None, vec![update("RUNNING", 1.0, None)]),
        // lag 3h
        pipeline("p-stream-old", true, None, vec![update("RUNNING", 3.0, None)]),
        // lag 1 minute, under the threshold
        pipeline("p-fresh", true, None, vec![update("RUNNING", 1.0 / 60.0, None)]),
        // triggered pipelines never lag
        pipeline("p-batch", false, None, vec![update("RUNNING", 5.0, None)]),
        pipeline(
            "p-broken",
            false,
            None,
            vec![
                update("FAILED", 2.0, Some("Update failed: schema mismatch")),
                update("COMPLETED", 20.0, None),
            ],
        ),
        pipeline(
            "p-stopping",
            false,
            Some("Internal error while stopping"),
            vec![update("STOPPING", 1.0, None)],
        ),
        pipeline("p-ancient", false, None, vec![update("FAILED", 72.0, None)]),
    ];
    ws
}

#[tokio::test]
async fn test_lagging_pipelines_are_estimated() {
    let admin = PipelinesAdmin::new(pipeline_workspace().into_arc());

    let result = admin.list_lagging_pipelines(600.0, 50).await.unwrap();
    let ids: Vec<&str> = result.iter().map(|p| p.pipeline_id.as_str()).collect();
    assert_eq!(ids, vec!["p-stream-old", "p-stream"]);
    let lag = result[0].lag_seconds.unwrap();
    assert!(lag.is_estimated());
    assert!((lag.value() - 3.0 * 3600.0).abs() < 5.0);
    assert_eq!(result[0].name, "p-stream-old-pipeline");

    let err = admin.list_lagging_pipelines(0.0, 50).await.unwrap_err();
    assert_eq!(err.to_string(), "max_lag_seconds must be positive");
}

#[tokio::test]
async fn test_failed_pipelines() {
    let admin = PipelinesAdmin::new(pipeline_workspace().into_arc());

    let result = admin.list_failed_pipelines(24.0, 50).await.unwrap();
    let ids: Vec<&str> = result.iter().map(|p| p.pipeline_id.as_str()).collect();
    assert_eq!(ids, vec!["p-stopping", "p-broken"]);
    assert_eq!(result[0].state, "STOPPING");
    assert_eq!(
        result[0].last_error.as_deref(),
        Some("Internal error while stopping")
    );
    assert_eq!(
        result[1].last_error.as_deref(),
        Some("Update failed: schema mismatch")
    );
    assert!(result.iter().all(|p| p.lag_seconds.is_none()));
}
