mod common;

use admin_bridge_integrations::workspace::{ClusterInfo, ObjectPermissions};
use admin_bridge_integrations::{ClustersAdmin, PrincipalType, SecurityAdmin};
use common::{FakeWorkspace, hours_ago};
use serde_json::json;

fn cluster(
    id: &str,
    state: &str,
    started_hours_ago: f64,
    active_hours_ago: Option<f64>,
) -> ClusterInfo {
    ClusterInfo {
        cluster_id: id.to_string(),
        cluster_name: Some(format!("{}-name", id)),
        state: Some(state.to_string()),
        creator_user_name: Some("alice@example.com".into()),
        start_time: Some(hours_ago(started_hours_ago)),
        last_activity_time: active_hours_ago.map(hours_ago),
        driver_node_type_id: Some("i3.xlarge".into()),
        node_type_id: Some("i3.xlarge".into()),
        policy_id: None,
        num_workers: Some(2),
    }
}

fn cluster_workspace() -> FakeWorkspace {
    let mut ws = FakeWorkspace::new();
    ws.clusters = vec![
        cluster("c-long", "RUNNING", 12.0, Some(0.1)),
        cluster("c-resizing", "RESIZING", 20.0, Some(5.0)),
        cluster("c-short", "RUNNING", 3.0, None),
        cluster("c-old", "RUNNING", 48.0, Some(30.0)),
        cluster("c-stopped", "TERMINATED", 10.0, Some(9.0)),
    ];
    ws
}

#[tokio::test]
async fn test_long_running_clusters() {
    let admin = ClustersAdmin::new(cluster_workspace().into_arc());

    let result = admin.list_long_running_clusters(8.0, 24.0, 50).await.unwrap();
    let ids: Vec<&str> = result.iter().map(|c| c.cluster_id.as_str()).collect();
    // c-old started before the lookback window
    assert_eq!(ids, vec!["c-resizing", "c-long"]);
    assert!(result.iter().all(|c| c.is_long_running));
    assert_eq!(result[1].runtime_hours, Some(12.0));
    assert_eq!(result[1].cluster_name, "c-long-name");
    assert_eq!(result[1].idle_hours, None);
}

#[tokio::test]
async fn test_idle_clusters_fall_back_to_start_time() {
    let admin = ClustersAdmin::new(cluster_workspace().into_arc());

    let result = admin.list_idle_clusters(2.0, 50).await.unwrap();
    let ids: Vec<&str> = result.iter().map(|c| c.cluster_id.as_str()).collect();
    assert_eq!(ids, vec!["c-old", "c-short"]);
    assert_eq!(result[0].idle_hours, Some(30.0));
    assert_eq!(result[1].idle_hours, Some(3.0));

    let err = admin.list_idle_clusters(0.0, 50).await.unwrap_err();
    assert_eq!(err.to_string(), "idle_hours must be positive");
}

fn permissions(value: serde_json::Value) -> ObjectPermissions {
    serde_json::from_value(value).unwrap()
}

fn security_workspace() -> FakeWorkspace {
    let mut ws = FakeWorkspace::new();
    ws.permissions.insert(
        ("jobs".into(), "42".into()),
        permissions(json!({
            "object_id": "/jobs/42",
            "object_type": "job",
            "access_control_list": [
                {"user_name": "owner@example.com", "all_permissions": [{"permission_level": "IS_OWNER"}]},
                {"group_name": "data-eng", "all_permissions": [{"permission_level": "CAN_MANAGE"}]},
                {"user_name": "viewer@example.com", "all_permissions": [{"permission_level": "CAN_VIEW"}]}
            ]
        })),
    );
    ws.permissions.insert(
        ("jobs".into(), "7".into()),
        permissions(json!({"object_id": "/jobs/7", "access_control_list": [
            {"user_name": "viewer@example.com", "all_permissions": [{"permission_level": "CAN_VIEW"}]}
        ]})),
    );
    ws.permissions.insert(
        ("clusters".into(), "c-1".into()),
        permissions(json!({"access_control_list": [
            {"user_name": "analyst@example.com", "all_permissions": [{"permission_level": "CAN_ATTACH_TO"}]},
            {"service_principal_name": "etl-sp", "all_permissions": [{"permission_level": "CAN_RESTART"}]},
            {"group_name": "admins", "all_permissions": [{"permission_level": "CAN_MANAGE", "inherited": true}]}
        ]})),
    );
    ws
}

#[tokio::test]
async fn test_who_can_manage_job() {
    let admin = SecurityAdmin::new(security_workspace().into_arc());

    let entries = admin.who_can_manage_job(42).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].principal, "data-eng");
    assert_eq!(entries[0].principal_type, PrincipalType::Group);
    assert_eq!(entries[0].permission_level, "CAN_MANAGE");
    assert_eq!(entries[0].object_type, "JOB");
    assert_eq!(entries[0].object_id, "42");
}

#[tokio::test]
async fn test_missing_job_differs_from_empty_result() {
    let admin = SecurityAdmin::new(security_workspace().into_arc());

    let empty = admin.who_can_manage_job(7).await.unwrap();
    assert!(empty.is_empty());

    let err = admin.who_can_manage_job(999).await.unwrap_err();
    assert_eq!(err.kind(), "resource_not_found");

    let err = admin.who_can_manage_job(0).await.unwrap_err();
    assert_eq!(err.to_string(), "job_id must be positive");
}

#[tokio::test]
async fn test_who_can_use_cluster() {
    let admin = SecurityAdmin::new(security_workspace().into_arc());

    let entries = admin.who_can_use_cluster("c-1").await.unwrap();
    let principals: Vec<(&str, PrincipalType)> = entries
        .iter()
        .map(|e| (e.principal.as_str(), e.principal_type))
        .collect();
    assert_eq!(
        principals,
        vec![
            ("analyst@example.com", PrincipalType::User),
            ("etl-sp", PrincipalType::ServicePrincipal),
            ("admins", PrincipalType::Group),
        ]
    );

    let err = admin.who_can_use_cluster("").await.unwrap_err();
    assert_eq!(err.to_string(), "cluster_id must be a non-empty string");
}
