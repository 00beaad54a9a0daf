//! Chargeback aggregation: group usage records by a dimension and sum their measures.

use crate::error::{AdminBridgeError, Result};
use crate::schemas::UsageEntry;
use crate::window::{Limit, LookbackWindow, Metric, Order, Selection};
use crate::workspace::{Row, row_f64, row_json, row_str, row_time};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dimension {
    Workspace,
    Cluster,
    Job,
    Warehouse,
    Tag(String),
}

impl Dimension {
    /// Chargeback grammar: `workspace`, `cluster`, `job`, `warehouse` or `tag:<key>`.
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if let Some(key) = selector.strip_prefix("tag:") {
            return Self::tag(key);
        }
        Self::builtin(selector)
            .ok_or_else(|| AdminBridgeError::Validation(format!("Unsupported dimension: {}", selector)))
    }

    /// Budget grammar. Budgets are commonly keyed by tags such as `project` or `team`, so any
    /// other bare word is read as a tag key.
    pub fn parse_budget(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if let Some(key) = selector.strip_prefix("tag:") {
            return Self::tag(key);
        }
        if selector.is_empty() {
            return Err(AdminBridgeError::Validation(
                "Unsupported dimension: ".to_string(),
            ));
        }
        match Self::builtin(selector) {
            Some(dimension) => Ok(dimension),
            None => Self::tag(selector),
        }
    }

    fn builtin(name: &str) -> Option<Self> {
        match name {
            "workspace" => Some(Self::Workspace),
            "cluster" => Some(Self::Cluster),
            "job" => Some(Self::Job),
            "warehouse" => Some(Self::Warehouse),
            _ => None,
        }
    }

    fn tag(key: &str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AdminBridgeError::Validation(
                "Tag dimension must specify a key".to_string(),
            ));
        }
        Ok(Self::Tag(key.to_string()))
    }

    /// Label written into `UsageEntry::scope`. Every tag key shares the `tag` scope.
    pub fn scope(&self) -> &str {
        match self {
            Self::Tag(_) => "tag",
            other => other.budget_key(),
        }
    }

    /// The selector as a caller would write it, e.g. `tag:team`.
    pub fn selector(&self) -> String {
        match self {
            Self::Tag(key) => format!("tag:{}", key),
            other => other.budget_key().to_string(),
        }
    }

    /// Value of the budget table's `dimension_type` column.
    pub fn budget_key(&self) -> &str {
        match self {
            Self::Workspace => "workspace",
            Self::Cluster => "cluster",
            Self::Job => "job",
            Self::Warehouse => "warehouse",
            Self::Tag(key) => key,
        }
    }

    pub fn resolve<'a>(&self, record: &'a UsageRecord) -> Option<&'a str> {
        let value = match self {
            Self::Workspace => record.workspace_id.as_deref(),
            Self::Cluster => record.cluster_id.as_deref(),
            Self::Job => record.job_id.as_deref(),
            Self::Warehouse => record.warehouse_id.as_deref(),
            Self::Tag(key) => record.tags.get(key).map(String::as_str),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// One row of the usage events table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub workspace_id: Option<String>,
    pub cluster_id: Option<String>,
    pub job_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub tags: HashMap<String, String>,
    pub cost: f64,
    pub dbus: Option<f64>,
}

impl UsageRecord {
    pub fn from_row(row: &Row) -> Self {
        let tags = match row_json(row, "tags") {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    Value::Null => None,
                    other => Some((k, other.to_string())),
                })
                .collect(),
            _ => HashMap::new(),
        };
        Self {
            timestamp: row_time(row, "timestamp"),
            workspace_id: row_str(row, "workspace_id"),
            cluster_id: row_str(row, "cluster_id"),
            job_id: row_str(row, "job_id"),
            warehouse_id: row_str(row, "warehouse_id"),
            tags,
            cost: row_f64(row, "cost").unwrap_or(0.0),
            dbus: row_f64(row, "dbu_consumed"),
        }
    }
}

/// Summed measures of one dimension value.
#[derive(Debug, Clone, PartialEq)]
pub struct CostGroup {
    pub value: String,
    pub cost: f64,
    pub dbus: Option<f64>,
}

/// Group in-window records by dimension value, in order of first appearance.
pub fn group_costs(
    records: &[UsageRecord],
    dimension: &Dimension,
    window: &LookbackWindow,
) -> Vec<CostGroup> {
    let mut groups: Vec<CostGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unattributed = 0usize;

    let in_window = Selection::from_records(records.iter()).within(window, |r| r.timestamp);
    let in_window_count = in_window.len();

    for record in in_window.into_vec() {
        let Some(value) = dimension.resolve(record) else {
            unattributed += 1;
            continue;
        };
        let slot = *index.entry(value.to_string()).or_insert_with(|| {
            groups.push(CostGroup {
                value: value.to_string(),
                cost: 0.0,
                dbus: None,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.cost += record.cost;
        if let Some(dbus) = record.dbus {
            group.dbus = Some(group.dbus.unwrap_or(0.0) + dbus);
        }
    }

    if unattributed > 0 {
        log::debug!(
            "{} of {} in-window usage records have no {} value",
            unattributed,
            in_window_count,
            dimension.selector()
        );
    }
    groups
}

/// Chargeback rows ordered by summed cost, most expensive first.
pub fn aggregate_costs(
    records: &[UsageRecord],
    dimension: &Dimension,
    window: &LookbackWindow,
    limit: Limit,
) -> Vec<UsageEntry> {
    let scope = dimension.scope().to_string();
    Selection::from_records(group_costs(records, dimension, window))
        .rank_by(|group| group.cost, Order::Descending)
        .take(limit)
        .into_iter()
        .map(|group| UsageEntry {
            scope: scope.clone(),
            name: group.value,
            start_time: window.start(),
            end_time: window.end(),
            cost: Some(group.cost),
            dbus: group.dbus.map(Metric::Measured),
        })
        .collect()
}
