use crate::mcp_helpers::display_result;
use admin_bridge_integrations::{
    DatabricksRestClient, SecurityAdmin, WhoCanManageJobArgs, WhoCanUseClusterArgs,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct SecurityProvider {
    admin: Arc<SecurityAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SecurityProvider {
    pub fn new(client: Arc<DatabricksRestClient>) -> Self {
        Self {
            admin: Arc::new(SecurityAdmin::new(client)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "who_can_manage_job",
        description = "Return the users, groups and service principals holding a manage-level permission on a job. \
                       Fails with resource_not_found when the job does not exist; an empty list means nobody matches."
    )]
    pub async fn who_can_manage_job(
        &self,
        Parameters(args): Parameters<WhoCanManageJobArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(self.admin.who_can_manage_job(args.job_id).await)
    }

    #[tool(
        name = "who_can_use_cluster",
        description = "Return the users, groups and service principals that can use a cluster: \
                       CAN_ATTACH_TO, CAN_RESTART and CAN_MANAGE permissions. \
                       Useful for auditing who can execute code on a compute resource."
    )]
    pub async fn who_can_use_cluster(
        &self,
        Parameters(args): Parameters<WhoCanUseClusterArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(self.admin.who_can_use_cluster(&args.cluster_id).await)
    }
}

#[tool_handler]
impl ServerHandler for SecurityProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
