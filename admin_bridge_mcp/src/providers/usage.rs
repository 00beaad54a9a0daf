use crate::mcp_helpers::{display_result, report_result};
use admin_bridge_integrations::{
    AdminBridgeConfig, BudgetStatusArgs, CostByDimensionArgs, DatabricksRestClient,
    TopCostCentersArgs, UsageAdmin,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

#[derive(Clone)]
pub struct UsageProvider {
    admin: Arc<UsageAdmin<DatabricksRestClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl UsageProvider {
    pub fn new(client: Arc<DatabricksRestClient>, config: &AdminBridgeConfig) -> Self {
        Self {
            admin: Arc::new(UsageAdmin::new(client, config)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "top_cost_centers",
        description = "Return the clusters and running SQL warehouses with the highest estimated DBU consumption \
                       over a number of days. DBU values are rough estimates from uptime and size \
                       (marked kind=estimated) and no cost is reported."
    )]
    pub async fn top_cost_centers(
        &self,
        Parameters(args): Parameters<TopCostCentersArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        display_result(
            self.admin
                .top_cost_centers(args.lookback_days, args.limit)
                .await,
        )
    }

    #[tool(
        name = "cost_by_dimension",
        description = "Aggregate cost and DBU consumption by a dimension for chargeback: workspace, cluster, job, \
                       warehouse, or tag:<key> such as tag:team. Most expensive first. \
                       When the usage table is not configured the result is empty and a note says so."
    )]
    pub async fn cost_by_dimension(
        &self,
        Parameters(args): Parameters<CostByDimensionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        report_result(
            self.admin
                .cost_by_dimension(&args.dimension, args.lookback_days, args.limit)
                .await,
        )
    }

    #[tool(
        name = "budget_status",
        description = "Compare actual cost against budgets for a dimension (workspace, cluster, job, warehouse, \
                       or a tag key such as project or team). Each budget is labeled within_budget, warning or \
                       breached; warning starts at warn_threshold (default 0.8) of the budget."
    )]
    pub async fn budget_status(
        &self,
        Parameters(args): Parameters<BudgetStatusArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        report_result(
            self.admin
                .budget_status(&args.dimension, args.period_days, args.warn_threshold)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for UsageProvider {
    fn get_info(&self) -> ServerInfo {
        crate::mcp_helpers::internal_server_info()
    }
}
