use crate::config::AdminBridgeConfig;
use crate::error::Result;
use crate::schemas::{AuditEvent, Report};
use crate::tables::query_table;
use crate::window::{Limit, LookbackWindow, Order, Selection};
use crate::workspace::{Row, WorkspaceApi, row_f64, row_json, row_str, row_time};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const ADMIN_ACTIONS: &[&str] = &[
    "addPrincipalToGroup",
    "removePrincipalFromGroup",
    "createServicePrincipal",
    "deleteServicePrincipal",
    "changePermissions",
    "updatePermissions",
];

fn default_lookback_hours() -> f64 {
    24.0
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AuditQueryArgs {
    /// How far back to search the audit log in hours (default: 24.0)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    /// Maximum number of results to return (default: 100)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Security-relevant events from the workspace audit log table.
pub struct AuditAdmin<W> {
    ws: Arc<W>,
    audit_table: String,
    warehouse_id: Option<String>,
}

impl<W: WorkspaceApi> AuditAdmin<W> {
    pub fn new(ws: Arc<W>, config: &AdminBridgeConfig) -> Self {
        Self {
            ws,
            audit_table: config.audit_table.clone(),
            warehouse_id: config.warehouse_id.clone(),
        }
    }

    /// Login attempts rejected with a client error, newest first.
    pub async fn failed_logins(&self, lookback_hours: f64, limit: i64) -> Result<Report<AuditEvent>> {
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;
        info!("Querying failed logins for last {}h", lookback_hours);
        self.events(&window, limit, "failed logins", is_failed_login)
            .await
    }

    /// Group membership, service principal and permission changes, newest first.
    pub async fn recent_admin_changes(
        &self,
        lookback_hours: f64,
        limit: i64,
    ) -> Result<Report<AuditEvent>> {
        let window = LookbackWindow::hours("lookback_hours", lookback_hours)?;
        let limit = Limit::new(limit)?;
        info!("Querying admin changes for last {}h", lookback_hours);
        self.events(&window, limit, "admin changes", is_admin_change)
            .await
    }

    async fn events(
        &self,
        window: &LookbackWindow,
        limit: Limit,
        what: &str,
        predicate: fn(&AuditRow) -> bool,
    ) -> Result<Report<AuditEvent>> {
        let sql = audit_sql(&self.audit_table, window);
        let Some(rows) = query_table(
            self.ws.as_ref(),
            self.warehouse_id.as_deref(),
            &self.audit_table,
            &sql,
        )
        .await
        .map_err(|e| e.context(&format!("query {}", what)))?
        else {
            return Ok(Report::unconfigured(vec![self.audit_table.clone()]));
        };

        let events = Selection::from_records(rows.iter().filter_map(AuditRow::from_row))
            .within(window, |row| Some(row.event.event_time))
            .filter(|row| predicate(row))
            .rank_by(|row| row.event.event_time, Order::Descending)
            .take(limit);

        info!("Found {} {}", events.len(), what);
        Ok(Report::available(
            events.into_iter().map(|row| row.event).collect(),
        ))
    }
}

/// An audit log row with the fields the classifiers look at.
struct AuditRow {
    event: AuditEvent,
    status_code: Option<u16>,
    request_params: Option<Value>,
}

impl AuditRow {
    fn from_row(row: &Row) -> Option<Self> {
        let Some(event_time) = row_time(row, "event_time") else {
            debug!("Skipping audit row without event_time");
            return None;
        };
        let status_code = row_f64(row, "status_code").map(|code| code as u16);
        let request_params = row_json(row, "request_params");
        let details = json!({
            "request_params": request_params,
            "response_status_code": status_code,
        });
        Some(Self {
            event: AuditEvent {
                event_time,
                service_name: row_str(row, "service_name").unwrap_or_default(),
                event_type: row_str(row, "action_name").unwrap_or_default(),
                user_name: row_str(row, "user_email"),
                source_ip: row_str(row, "source_ip_address"),
                details: Some(details),
            },
            status_code,
            request_params,
        })
    }

    fn is_login(&self) -> bool {
        self.event.event_type.to_lowercase().contains("login")
    }
}

fn is_failed_login(row: &AuditRow) -> bool {
    row.is_login() && row.status_code.is_some_and(|code| (400..500).contains(&code))
}

fn is_admin_change(row: &AuditRow) -> bool {
    if row.is_login() {
        return false;
    }
    ADMIN_ACTIONS.contains(&row.event.event_type.as_str())
        || row.event.service_name == "accounts"
        || mentions_admin_group(row.request_params.as_ref())
}

fn mentions_admin_group(params: Option<&Value>) -> bool {
    params
        .and_then(|p| p.get("group_name"))
        .and_then(Value::as_str)
        .is_some_and(|group| group.to_lowercase().contains("admin"))
}

fn audit_sql(table: &str, window: &LookbackWindow) -> String {
    format!(
        "SELECT event_time, service_name, action_name, user_identity.email AS user_email, \
         source_ip_address, to_json(request_params) AS request_params, \
         response.status_code AS status_code \
         FROM {} WHERE event_time >= '{}'",
        table,
        window.start_sql_literal()
    )
}
