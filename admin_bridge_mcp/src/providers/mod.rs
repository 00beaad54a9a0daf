pub mod audit;
pub mod clusters;
pub mod dbsql;
pub mod jobs;
pub mod pipelines;
pub mod security;
pub mod usage;

pub use audit::AuditProvider;
pub use clusters::ClustersProvider;
pub use dbsql::DbsqlProvider;
pub use jobs::JobsProvider;
pub use pipelines::PipelinesProvider;
pub use security::SecurityProvider;
pub use usage::UsageProvider;

use crate::config::ServerConfig;
use admin_bridge_integrations::DatabricksRestClient;
use eyre::Result;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam,
    ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData, ServerHandler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
pub enum Domain {
    Jobs,
    Dbsql,
    Clusters,
    Security,
    Usage,
    Audit,
    Pipelines,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::Jobs,
        Domain::Dbsql,
        Domain::Clusters,
        Domain::Security,
        Domain::Usage,
        Domain::Audit,
        Domain::Pipelines,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::Jobs => "Jobs",
            Domain::Dbsql => "DBSQL",
            Domain::Clusters => "Clusters",
            Domain::Security => "Security",
            Domain::Usage => "Usage",
            Domain::Audit => "Audit",
            Domain::Pipelines => "Pipelines",
        }
    }

    /// Case-insensitive parse used by the `--domains` flag.
    pub fn parse(raw: &str) -> Result<Self> {
        Domain::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| {
                let known: Vec<_> = Domain::ALL.iter().map(|d| d.label()).collect();
                eyre::eyre!("unknown domain '{}', expected one of: {}", raw, known.join(", "))
            })
    }
}

const TOOL_DOMAINS: &[(&str, Domain)] = &[
    ("list_long_running_jobs", Domain::Jobs),
    ("list_failed_jobs", Domain::Jobs),
    ("top_slowest_queries", Domain::Dbsql),
    ("user_query_summary", Domain::Dbsql),
    ("list_long_running_clusters", Domain::Clusters),
    ("list_idle_clusters", Domain::Clusters),
    ("who_can_manage_job", Domain::Security),
    ("who_can_use_cluster", Domain::Security),
    ("top_cost_centers", Domain::Usage),
    ("cost_by_dimension", Domain::Usage),
    ("budget_status", Domain::Usage),
    ("failed_logins", Domain::Audit),
    ("recent_admin_changes", Domain::Audit),
    ("list_lagging_pipelines", Domain::Pipelines),
    ("list_failed_pipelines", Domain::Pipelines),
];

pub fn domain_of(tool_name: &str) -> Option<Domain> {
    TOOL_DOMAINS
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, domain)| *domain)
}

enum TargetProvider {
    Jobs(Arc<JobsProvider>),
    Dbsql(Arc<DbsqlProvider>),
    Clusters(Arc<ClustersProvider>),
    Security(Arc<SecurityProvider>),
    Usage(Arc<UsageProvider>),
    Audit(Arc<AuditProvider>),
    Pipelines(Arc<PipelinesProvider>),
}

#[derive(Clone)]
pub struct CombinedProvider {
    jobs: Option<Arc<JobsProvider>>,
    dbsql: Option<Arc<DbsqlProvider>>,
    clusters: Option<Arc<ClustersProvider>>,
    security: Option<Arc<SecurityProvider>>,
    usage: Option<Arc<UsageProvider>>,
    audit: Option<Arc<AuditProvider>>,
    pipelines: Option<Arc<PipelinesProvider>>,
}

impl CombinedProvider {
    /// Build one provider per enabled domain, all sharing the same REST client.
    pub fn new(config: &ServerConfig, client: Arc<DatabricksRestClient>) -> Result<Self> {
        if Domain::ALL.iter().all(|d| !config.is_enabled(*d)) {
            return Err(eyre::eyre!("at least one domain must be enabled"));
        }
        let enabled = |domain: Domain| config.is_enabled(domain);
        let workspace = &config.workspace;
        Ok(Self {
            jobs: enabled(Domain::Jobs)
                .then(|| Arc::new(JobsProvider::new(client.clone(), workspace))),
            dbsql: enabled(Domain::Dbsql).then(|| Arc::new(DbsqlProvider::new(client.clone()))),
            clusters: enabled(Domain::Clusters)
                .then(|| Arc::new(ClustersProvider::new(client.clone()))),
            security: enabled(Domain::Security)
                .then(|| Arc::new(SecurityProvider::new(client.clone()))),
            usage: enabled(Domain::Usage)
                .then(|| Arc::new(UsageProvider::new(client.clone(), workspace))),
            audit: enabled(Domain::Audit)
                .then(|| Arc::new(AuditProvider::new(client.clone(), workspace))),
            pipelines: enabled(Domain::Pipelines)
                .then(|| Arc::new(PipelinesProvider::new(client.clone()))),
        })
    }

    pub fn enabled_domains(&self) -> Vec<Domain> {
        let flags = [
            (Domain::Jobs, self.jobs.is_some()),
            (Domain::Dbsql, self.dbsql.is_some()),
            (Domain::Clusters, self.clusters.is_some()),
            (Domain::Security, self.security.is_some()),
            (Domain::Usage, self.usage.is_some()),
            (Domain::Audit, self.audit.is_some()),
            (Domain::Pipelines, self.pipelines.is_some()),
        ];
        flags
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(domain, _)| domain)
            .collect()
    }

    fn resolve_provider(&self, tool_name: &str) -> std::result::Result<TargetProvider, ErrorData> {
        let domain = domain_of(tool_name).ok_or_else(|| {
            ErrorData::invalid_params(format!("unknown tool: {}", tool_name), None)
        })?;
        let target = match domain {
            Domain::Jobs => self.jobs.clone().map(TargetProvider::Jobs),
            Domain::Dbsql => self.dbsql.clone().map(TargetProvider::Dbsql),
            Domain::Clusters => self.clusters.clone().map(TargetProvider::Clusters),
            Domain::Security => self.security.clone().map(TargetProvider::Security),
            Domain::Usage => self.usage.clone().map(TargetProvider::Usage),
            Domain::Audit => self.audit.clone().map(TargetProvider::Audit),
            Domain::Pipelines => self.pipelines.clone().map(TargetProvider::Pipelines),
        };
        target.ok_or_else(|| {
            ErrorData::invalid_params(
                format!(
                    "{} tools are disabled. Add {:?} to enabled_domains to use {}.",
                    domain.label(),
                    domain,
                    tool_name
                ),
                None,
            )
        })
    }
}

impl ServerHandler for CombinedProvider {
    fn get_info(&self) -> ServerInfo {
        let domains: Vec<_> = self.enabled_domains().iter().map(|d| d.label()).collect();

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "admin-bridge-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Admin Bridge MCP Server".to_string()),
                website_url: None,
                icons: None,
            },
            instructions: Some(format!(
                "Read-only Databricks workspace administration tools for: {}. \
                 Time windows are relative to now; results are sorted and truncated to the requested limit.",
                domains.join(", ")
            )),
        }
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        tracing::info!(tool = %params.name, "tool call");
        let result = match self.resolve_provider(&params.name)? {
            TargetProvider::Jobs(provider) => provider.call_tool(params, context).await,
            TargetProvider::Dbsql(provider) => provider.call_tool(params, context).await,
            TargetProvider::Clusters(provider) => provider.call_tool(params, context).await,
            TargetProvider::Security(provider) => provider.call_tool(params, context).await,
            TargetProvider::Usage(provider) => provider.call_tool(params, context).await,
            TargetProvider::Audit(provider) => provider.call_tool(params, context).await,
            TargetProvider::Pipelines(provider) => provider.call_tool(params, context).await,
        };
        if let Err(e) = &result {
            tracing::warn!(code = ?e.code, "tool call failed: {}", e.message);
        }
        result
    }

    async fn list_tools(
        &self,
        params: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        let mut tools = Vec::new();

        if let Some(ref jobs) = self.jobs {
            tools.extend(jobs.list_tools(params.clone(), context.clone()).await?.tools);
        }
        if let Some(ref dbsql) = self.dbsql {
            tools.extend(dbsql.list_tools(params.clone(), context.clone()).await?.tools);
        }
        if let Some(ref clusters) = self.clusters {
            tools.extend(clusters.list_tools(params.clone(), context.clone()).await?.tools);
        }
        if let Some(ref security) = self.security {
            tools.extend(security.list_tools(params.clone(), context.clone()).await?.tools);
        }
        if let Some(ref usage) = self.usage {
            tools.extend(usage.list_tools(params.clone(), context.clone()).await?.tools);
        }
        if let Some(ref audit) = self.audit {
            tools.extend(audit.list_tools(params.clone(), context.clone()).await?.tools);
        }
        if let Some(ref pipelines) = self.pipelines {
            tools.extend(pipelines.list_tools(params.clone(), context.clone()).await?.tools);
        }

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_domain_has_tools() {
        for domain in Domain::ALL {
            assert!(
                TOOL_DOMAINS.iter().any(|(_, d)| *d == domain),
                "{:?} has no tools",
                domain
            );
        }
        assert_eq!(TOOL_DOMAINS.len(), 15);
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(Domain::parse("dbsql").unwrap(), Domain::Dbsql);
        assert_eq!(Domain::parse(" Usage ").unwrap(), Domain::Usage);
        assert!(Domain::parse("billing").is_err());
        assert_eq!(domain_of("budget_status"), Some(Domain::Usage));
        assert_eq!(domain_of("drop_table"), None);
    }
}
