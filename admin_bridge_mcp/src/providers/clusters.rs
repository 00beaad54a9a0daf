use crate::mcp_helpers::display_result;
use admin_bridge_integrations::{
    ClustersAdmin, DatabricksRestClient, ListIdleClustersArgs, ListLongRunningClustersArgs,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct ClustersProvider {
    admin: Arc<ClustersAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ClustersProvider {
    pub fn new(client: Arc<DatabricksRestClient>) -> Self {
        Self {
            admin: Arc::new(ClustersAdmin::new(client)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "list_long_running_clusters",
        description = "List active clusters (RUNNING, RESIZING, RESTARTING) started within the lookback window \
                       that have been up longer than a number of hours. Useful for finding clusters left running. \
                       Returns cluster id and name, state, creator, node types, policy and runtime hours, longest first."
    )]
    pub async fn list_long_running_clusters(
        &self,
        Parameters(args): Parameters<ListLongRunningClustersArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .list_long_running_clusters(args.min_duration_hours, args.lookback_hours, args.limit)
                .await,
        )
    }

    #[tool(
        name = "list_idle_clusters",
        description = "List running clusters with no activity for at least a number of hours. \
                       Falls back to the start time when a cluster reports no activity. \
                       These are candidates for termination. Idlest first."
    )]
    pub async fn list_idle_clusters(
        &self,
        Parameters(args): Parameters<ListIdleClustersArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .list_idle_clusters(args.idle_hours, args.limit)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for ClustersProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
