use crate::mcp_helpers::report_result;
use admin_bridge_integrations::{AdminBridgeConfig, AuditAdmin, AuditQueryArgs, DatabricksRestClient};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuditProvider {
    admin: Arc<AuditAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AuditProvider {
    pub fn new(client: Arc<DatabricksRestClient>, config: &AdminBridgeConfig) -> Self {
        Self {
            admin: Arc::new(AuditAdmin::new(client, config)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "failed_logins",
        description = "Return failed login attempts from the audit log within a time window, newest first. \
                       Includes user, source IP and response status. Useful for detecting brute force attempts."
    )]
    pub async fn failed_logins(
        &self,
        Parameters(args): Parameters<AuditQueryArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        report_result(
            self.admin
                .failed_logins(args.lookback_hours, args.limit)
                .await,
        )
    }

    #[tool(
        name = "recent_admin_changes",
        description = "Return recent administrative events from the audit log: group membership changes, \
                       service principal changes, permission changes and account-level events, newest first."
    )]
    pub async fn recent_admin_changes(
        &self,
        Parameters(args): Parameters<AuditQueryArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        report_result(
            self.admin
                .recent_admin_changes(args.lookback_hours, args.limit)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for AuditProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
