use crate::mcp_helpers::display_result;
use admin_bridge_integrations::{
    AdminBridgeConfig, DatabricksRestClient, JobsAdmin, ListFailedJobsArgs,
    ListLongRunningJobsArgs,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct JobsProvider {
    admin: Arc<JobsAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl JobsProvider {
    pub fn new(client: Arc<DatabricksRestClient>, config: &AdminBridgeConfig) -> Self {
        Self {
            admin: Arc::new(JobsAdmin::new(client).with_warehouse(config.warehouse_id.clone())),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "list_long_running_jobs",
        description = "List job runs that have been running longer than a number of hours. \
                       Runs without an end time count while they are still RUNNING. \
                       Useful for spotting stuck or slow workloads. Returns job id and name, run id, state, \
                       start/end time and duration in seconds and hours, longest first."
    )]
    pub async fn list_long_running_jobs(
        &self,
        Parameters(args): Parameters<ListLongRunningJobsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .list_long_running_jobs(args.min_duration_hours, args.lookback_hours, args.limit)
                .await,
        )
    }

    #[tool(
        name = "list_failed_jobs",
        description = "List job runs that failed, timed out or hit an internal error within a recent time window. \
                       Helps find recurring failures and monitor job reliability. Newest first."
    )]
    pub async fn list_failed_jobs(
        &self,
        Parameters(args): Parameters<ListFailedJobsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .list_failed_jobs(args.lookback_hours, args.limit)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for JobsProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
