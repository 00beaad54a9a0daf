use crate::error::{AdminBridgeError, Result, ensure_non_empty};
use crate::schemas::{PermissionEntry, PrincipalType};
use crate::workspace::{AccessControl, ObjectPermissions, WorkspaceApi};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MANAGE_LEVELS: &[&str] = &["MANAGE"];
const USE_LEVELS: &[&str] = &["ATTACH", "RESTART", "MANAGE"];

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct WhoCanManageJobArgs {
    /// Databricks job ID to check permissions for
    pub job_id: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct WhoCanUseClusterArgs {
    /// Databricks cluster ID to check permissions for
    pub cluster_id: String,
}

#[derive(Debug, Clone, Copy)]
enum ObjectKind {
    Job,
    Cluster,
}

impl ObjectKind {
    fn path_segment(self) -> &'static str {
        match self {
            Self::Job => "jobs",
            Self::Cluster => "clusters",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Job => "JOB",
            Self::Cluster => "CLUSTER",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Cluster => "cluster",
        }
    }
}

/// Permission lookups on individual workspace objects.
pub struct SecurityAdmin<W> {
    ws: Arc<W>,
}

impl<W: WorkspaceApi> SecurityAdmin<W> {
    pub fn new(ws: Arc<W>) -> Self {
        Self { ws }
    }

    /// Principals holding a manage-level permission on the job.
    pub async fn who_can_manage_job(&self, job_id: i64) -> Result<Vec<PermissionEntry>> {
        if job_id <= 0 {
            return Err(AdminBridgeError::Validation(
                "job_id must be positive".to_string(),
            ));
        }
        self.principals_with(ObjectKind::Job, &job_id.to_string(), MANAGE_LEVELS)
            .await
    }

    /// Principals that can attach to, restart or manage the cluster.
    pub async fn who_can_use_cluster(&self, cluster_id: &str) -> Result<Vec<PermissionEntry>> {
        let cluster_id = ensure_non_empty("cluster_id", cluster_id).map_err(|_| {
            AdminBridgeError::Validation("cluster_id must be a non-empty string".to_string())
        })?;
        self.principals_with(ObjectKind::Cluster, cluster_id, USE_LEVELS)
            .await
    }

    async fn principals_with(
        &self,
        kind: ObjectKind,
        object_id: &str,
        levels: &[&str],
    ) -> Result<Vec<PermissionEntry>> {
        info!("Checking permissions for {} {}", kind.noun(), object_id);

        let permissions = self
            .ws
            .get_permissions(kind.path_segment(), object_id)
            .await
            .map_err(|e| e.context(&format!("query permissions for {} {}", kind.noun(), object_id)))?;

        let entries = matching_entries(&permissions, kind, object_id, levels);
        info!(
            "Found {} principals with matching permissions on {} {}",
            entries.len(),
            kind.noun(),
            object_id
        );
        Ok(entries)
    }
}

fn principal_of(acl: &AccessControl) -> Option<(String, PrincipalType)> {
    if let Some(user) = &acl.user_name {
        return Some((user.clone(), PrincipalType::User));
    }
    if let Some(group) = &acl.group_name {
        return Some((group.clone(), PrincipalType::Group));
    }
    acl.service_principal_name
        .as_ref()
        .map(|sp| (sp.clone(), PrincipalType::ServicePrincipal))
}

/// One entry per (principal, matching grant), in access-control-list order.
fn matching_entries(
    permissions: &ObjectPermissions,
    kind: ObjectKind,
    object_id: &str,
    levels: &[&str],
) -> Vec<PermissionEntry> {
    let mut entries = Vec::new();
    for acl in &permissions.access_control_list {
        let Some((principal, principal_type)) = principal_of(acl) else {
            continue;
        };
        for grant in &acl.all_permissions {
            let Some(level) = grant.permission_level.as_deref() else {
                continue;
            };
            if levels.iter().any(|wanted| level.contains(wanted)) {
                entries.push(PermissionEntry {
                    object_type: kind.label().to_string(),
                    object_id: object_id.to_string(),
                    principal: principal.clone(),
                    principal_type,
                    permission_level: level.to_string(),
                });
            }
        }
    }
    entries
}
