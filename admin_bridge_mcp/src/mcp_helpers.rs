use admin_bridge_integrations::{AdminBridgeError, Report, ToolResultDisplay};
use rmcp::ErrorData;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use serde::Serialize;
use serde_json::json;

/// Helper to create generic ServerInfo for domain providers.
/// Only CombinedProvider's ServerInfo is exposed via MCP.
pub fn internal_server_info() -> ServerInfo {
    ServerInfo {
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            website_url: None,
            icons: None,
        },
        instructions: None,
    }
}

/// Map an admin error onto an MCP error, keeping the kind label so agents can branch on it.
pub fn to_error_data(err: AdminBridgeError) -> ErrorData {
    let data = Some(json!({
        "kind": err.kind(),
        "status": err.status_code(),
    }));
    match err {
        AdminBridgeError::Validation(_) => ErrorData::invalid_params(err.to_string(), data),
        AdminBridgeError::ResourceNotFound(_) => {
            ErrorData::resource_not_found(err.to_string(), data)
        }
        _ => ErrorData::internal_error(err.to_string(), data),
    }
}

pub fn display_result<T: ToolResultDisplay>(
    result: admin_bridge_integrations::Result<T>,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) => Ok(CallToolResult::success(vec![Content::text(value.display())])),
        Err(e) => Err(to_error_data(e)),
    }
}

/// Records as one text block, plus a second block carrying the note when the backing table is
/// not configured.
pub fn report_result<T: Serialize>(
    result: admin_bridge_integrations::Result<Report<T>>,
) -> Result<CallToolResult, ErrorData> {
    let report = result.map_err(to_error_data)?;
    let mut content = vec![Content::text(report.display())];
    if let Some(note) = report.note() {
        tracing::warn!("{}", note);
        content.push(Content::text(note));
    }
    Ok(CallToolResult::success(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn test_error_mapping_keeps_kind() {
        let err = to_error_data(AdminBridgeError::Validation("limit must be positive".into()));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.message, "limit must be positive");
        assert_eq!(err.data.unwrap()["kind"], json!("validation"));

        let err = to_error_data(AdminBridgeError::ResourceNotFound("job 9".into()));
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);

        let err = to_error_data(AdminBridgeError::RateLimited("slow down".into()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data.unwrap()["status"], json!(429));
    }

    #[test]
    fn test_unconfigured_report_adds_note_block() {
        let report: Report<u32> = Report::unconfigured(vec!["billing.budgets".into()]);
        let result = report_result(Ok(report)).unwrap();
        assert_eq!(result.content.len(), 2);

        let result = report_result(Ok(Report::available(vec![1, 2]))).unwrap();
        assert_eq!(result.content.len(), 1);
    }
}
