pub mod aggregate;
pub mod audit;
pub mod budget;
pub mod client;
pub mod clusters;
pub mod config;
pub mod dbsql;
pub mod error;
pub mod jobs;
pub mod pipelines;
pub mod schemas;
pub mod security;
pub mod tables;
pub mod usage;
pub mod window;
pub mod workspace;

// ============================================================================
// Shared Display Trait
// ============================================================================

pub trait ToolResultDisplay {
    fn display(&self) -> String;
}

pub use audit::{AuditAdmin, AuditQueryArgs};
pub use budget::{BudgetLabel, WarnThreshold};
pub use client::DatabricksRestClient;
pub use clusters::{ClustersAdmin, ListIdleClustersArgs, ListLongRunningClustersArgs};
pub use crate::config::{AdminBridgeConfig, Credentials};
pub use dbsql::{DbsqlAdmin, TopSlowestQueriesArgs, UserQuerySummaryArgs};
pub use error::{AdminBridgeError, Result};
pub use jobs::{JobsAdmin, ListFailedJobsArgs, ListLongRunningJobsArgs};
pub use pipelines::{ListFailedPipelinesArgs, ListLaggingPipelinesArgs, PipelinesAdmin};
pub use schemas::{
    AuditEvent, BudgetStatus, ClusterSummary, JobRunSummary, PermissionEntry, PipelineStatus,
    PrincipalType, QueryHistoryEntry, Report, SourceStatus, UsageEntry, UserQuerySummary,
};
pub use security::{SecurityAdmin, WhoCanManageJobArgs, WhoCanUseClusterArgs};
pub use usage::{BudgetStatusArgs, CostByDimensionArgs, TopCostCentersArgs, UsageAdmin};
pub use window::{LookbackWindow, Metric};
pub use workspace::WorkspaceApi;
