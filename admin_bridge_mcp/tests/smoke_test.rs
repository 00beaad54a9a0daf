//! Smoke test for admin-bridge-mcp server
//!
//! Verifies that:
//! - Server can be instantiated in-process without reaching a workspace
//! - Every admin tool is listed, and disabled domains are hidden
//! - Argument validation surfaces as invalid_params before any remote call

use admin_bridge_integrations::{Credentials, DatabricksRestClient};
use admin_bridge_mcp::config::ServerConfig;
use admin_bridge_mcp::providers::{CombinedProvider, Domain};
use eyre::Result;
use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParam, ErrorCode};
use rmcp_in_process_transport::in_process::TokioInProcess;
use serde_json::json;
use std::sync::Arc;

const ALL_TOOLS: [&str; 15] = [
    "list_long_running_jobs",
    "list_failed_jobs",
    "top_slowest_queries",
    "user_query_summary",
    "list_long_running_clusters",
    "list_idle_clusters",
    "who_can_manage_job",
    "who_can_use_cluster",
    "top_cost_centers",
    "cost_by_dimension",
    "budget_status",
    "failed_logins",
    "recent_admin_changes",
    "list_lagging_pipelines",
    "list_failed_pipelines",
];

fn offline_client() -> Arc<DatabricksRestClient> {
    let credentials = Credentials {
        host: "https://example.cloud.databricks.com".into(),
        token: "dapi-test".into(),
    };
    Arc::new(DatabricksRestClient::with_credentials(credentials, 5).unwrap())
}

fn config_with(domains: &[Domain]) -> ServerConfig {
    ServerConfig {
        enabled_domains: domains.to_vec(),
        ..Default::default()
    }
}

fn expect_invalid_params(err: rmcp::ServiceError) -> String {
    match err {
        rmcp::ServiceError::McpError(data) => {
            assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
            data.message.to_string()
        }
        other => panic!("expected MCP error, got {:?}", other),
    }
}

#[tokio::test]
async fn smoke_test_mcp_server() -> Result<()> {
    let provider = CombinedProvider::new(&ServerConfig::default(), offline_client())?;

    let tokio_in_process = TokioInProcess::new(provider).await?;
    let service = ().serve(tokio_in_process).await?;

    let server_info = service.peer_info();
    assert!(server_info.is_some(), "Server info should be available");

    let info = server_info.unwrap();
    assert_eq!(info.server_info.name, "admin-bridge-mcp");
    assert!(!info.server_info.version.is_empty());

    let tools_response = service.list_tools(Default::default()).await?;
    assert_eq!(tools_response.tools.len(), ALL_TOOLS.len());
    for name in ALL_TOOLS {
        assert!(
            tools_response.tools.iter().any(|t| t.name == name),
            "{} tool should be exposed",
            name
        );
    }

    service.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn test_disabled_domains_are_hidden() -> Result<()> {
    let provider =
        CombinedProvider::new(&config_with(&[Domain::Jobs, Domain::Usage]), offline_client())?;
    let service = ().serve(TokioInProcess::new(provider).await?).await?;

    let tools_response = service.list_tools(Default::default()).await?;
    let mut names: Vec<_> = tools_response.tools.iter().map(|t| t.name.to_string()).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "budget_status",
            "cost_by_dimension",
            "list_failed_jobs",
            "list_long_running_jobs",
            "top_cost_centers",
        ]
    );

    let err = service
        .call_tool(CallToolRequestParam {
            name: "failed_logins".into(),
            arguments: Some(json!({}).as_object().unwrap().clone()),
        })
        .await
        .unwrap_err();
    let message = expect_invalid_params(err);
    assert!(message.contains("disabled"), "{}", message);

    service.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn test_validation_errors_are_invalid_params() -> Result<()> {
    let provider = CombinedProvider::new(&ServerConfig::default(), offline_client())?;
    let service = ().serve(TokioInProcess::new(provider).await?).await?;

    let cases = [
        ("list_failed_jobs", json!({"limit": 0}), "limit"),
        ("list_long_running_jobs", json!({"lookback_hours": -1.0}), "lookback_hours"),
        ("user_query_summary", json!({"user_name": "  "}), "user_name"),
        ("who_can_manage_job", json!({"job_id": 0}), "job_id"),
        ("cost_by_dimension", json!({"dimension": "region"}), "dimension"),
        ("budget_status", json!({"dimension": "team", "warn_threshold": 1.5}), "warn_threshold"),
        ("list_lagging_pipelines", json!({"max_lag_seconds": 0.0}), "max_lag_seconds"),
    ];

    for (tool, args, field) in cases {
        let err = service
            .call_tool(CallToolRequestParam {
                name: tool.into(),
                arguments: Some(args.as_object().unwrap().clone()),
            })
            .await
            .unwrap_err();
        let message = expect_invalid_params(err);
        assert!(message.contains(field), "{}: {}", tool, message);
    }

    let err = service
        .call_tool(CallToolRequestParam {
            name: "drop_everything".into(),
            arguments: None,
        })
        .await
        .unwrap_err();
    assert!(expect_invalid_params(err).contains("unknown tool"));

    service.cancel().await?;
    Ok(())
}

#[test]
fn test_no_domains_is_rejected() {
    let result = CombinedProvider::new(&config_with(&[]), offline_client());
    assert!(result.is_err());
}
