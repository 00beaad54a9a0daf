use crate::mcp_helpers::display_result;
use admin_bridge_integrations::{
    DatabricksRestClient, DbsqlAdmin, TopSlowestQueriesArgs, UserQuerySummaryArgs,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct DbsqlProvider {
    admin: Arc<DbsqlAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DbsqlProvider {
    pub fn new(client: Arc<DatabricksRestClient>) -> Self {
        Self {
            admin: Arc::new(DbsqlAdmin::new(client)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "top_slowest_queries",
        description = "Return the slowest completed SQL warehouse queries in a time window, slowest first. \
                       Useful for finding query performance bottlenecks. Returns query id, user, warehouse, \
                       status, timing, duration and SQL text."
    )]
    pub async fn top_slowest_queries(
        &self,
        Parameters(args): Parameters<TopSlowestQueriesArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .top_slowest_queries(args.lookback_hours, args.limit)
                .await,
        )
    }

    #[tool(
        name = "user_query_summary",
        description = "Summarize SQL query activity for one user within a time window: query counts, \
                       success and failure counts, failure rate, duration statistics and warehouses used."
    )]
    pub async fn user_query_summary(
        &self,
        Parameters(args): Parameters<UserQuerySummaryArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .user_query_summary(&args.user_name, args.lookback_hours)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for DbsqlProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
