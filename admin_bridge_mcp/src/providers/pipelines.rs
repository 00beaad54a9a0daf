use crate::mcp_helpers::display_result;
use admin_bridge_integrations::{
    DatabricksRestClient, ListFailedPipelinesArgs, ListLaggingPipelinesArgs, PipelinesAdmin,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct PipelinesProvider {
    admin: Arc<PipelinesAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PipelinesProvider {
    pub fn new(client: Arc<DatabricksRestClient>) -> Self {
        Self {
            admin: Arc::new(PipelinesAdmin::new(client)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "list_lagging_pipelines",
        description = "List continuous Delta Live Tables pipelines whose lag exceeds a number of seconds. \
                       Lag is estimated as the age of the running update (marked kind=estimated), \
                       not read from streaming metrics. Most lagging first."
    )]
    pub async fn list_lagging_pipelines(
        &self,
        Parameters(args): Parameters<ListLaggingPipelinesArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .list_lagging_pipelines(args.max_lag_seconds, args.limit)
                .await,
        )
    }

    #[tool(
        name = "list_failed_pipelines",
        description = "List Delta Live Tables pipelines with a failed update in a recent time window, \
                       with the failure state and error message. Newest failure first."
    )]
    pub async fn list_failed_pipelines(
        &self,
        Parameters(args): Parameters<ListFailedPipelinesArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .list_failed_pipelines(args.lookback_hours, args.limit)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for PipelinesProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
