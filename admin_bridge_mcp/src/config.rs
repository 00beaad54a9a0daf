use crate::providers::Domain;
use admin_bridge_integrations::AdminBridgeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub workspace: AdminBridgeConfig,
    /// Tool groups exposed to agents.
    pub enabled_domains: Vec<Domain>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workspace: AdminBridgeConfig::default(),
            enabled_domains: Domain::ALL.to_vec(),
        }
    }
}

/// Per-field CLI overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub profile: Option<String>,
    pub warehouse_id: Option<String>,
    pub usage_table: Option<String>,
    pub budget_table: Option<String>,
    pub audit_table: Option<String>,
    pub enabled_domains: Option<Vec<Domain>>,
}

impl ServerConfig {
    pub fn load_from_dir() -> eyre::Result<Self> {
        Self::load_from(&crate::paths::config_path())
    }

    /// Read the config file, writing the defaults first when it does not exist yet.
    pub fn load_from(config_path: &Path) -> eyre::Result<Self> {
        if !config_path.exists() {
            let json = serde_json::to_string_pretty(&Self::default())?;
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(config_path, json)?;
        }

        let contents = std::fs::read_to_string(config_path)?;
        serde_json::from_str::<ServerConfig>(&contents).map_err(|e| {
            eyre::eyre!("Failed to parse config {}: {}", config_path.display(), e)
        })
    }

    pub fn apply_override(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(profile) = overrides.profile {
            self.workspace.profile = Some(profile);
        }
        if let Some(warehouse_id) = overrides.warehouse_id {
            self.workspace.warehouse_id = Some(warehouse_id);
        }
        if let Some(table) = overrides.usage_table {
            self.workspace.usage_table = table;
        }
        if let Some(table) = overrides.budget_table {
            self.workspace.budget_table = table;
        }
        if let Some(table) = overrides.audit_table {
            self.workspace.audit_table = table;
        }
        if let Some(domains) = overrides.enabled_domains {
            self.enabled_domains = domains;
        }
        self
    }

    pub fn is_enabled(&self, domain: Domain) -> bool {
        self.enabled_domains.contains(&domain)
    }
}
