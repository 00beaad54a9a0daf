use crate::error::{AdminBridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_USAGE_TABLE: &str = "billing.usage_events";
pub const DEFAULT_BUDGET_TABLE: &str = "billing.budgets";
pub const DEFAULT_AUDIT_TABLE: &str = "system.access.audit";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connection and data-source settings, built once at startup and shared by every admin type.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminBridgeConfig {
    /// Profile name in ~/.databrickscfg. Takes precedence over host/token.
    pub profile: Option<String>,
    pub host: Option<String>,
    pub token: Option<String>,
    /// SQL warehouse used for statement execution. First running warehouse when unset.
    pub warehouse_id: Option<String>,
    pub usage_table: String,
    pub budget_table: String,
    pub audit_table: String,
    pub request_timeout_secs: u64,
}

impl Default for AdminBridgeConfig {
    fn default() -> Self {
        Self {
            profile: None,
            host: None,
            token: None,
            warehouse_id: None,
            usage_table: DEFAULT_USAGE_TABLE.to_string(),
            budget_table: DEFAULT_BUDGET_TABLE.to_string(),
            audit_table: DEFAULT_AUDIT_TABLE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub host: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("token", &"[redacted]")
            .finish()
    }
}

impl AdminBridgeConfig {
    /// Resolve credentials: profile, then explicit host + token, then environment.
    pub fn resolve_credentials(&self) -> Result<Credentials> {
        if let Some(profile) = &self.profile {
            let path = databrickscfg_path().ok_or_else(|| {
                AdminBridgeError::Configuration("cannot locate home directory".to_string())
            })?;
            return credentials_from_profile(&path, profile);
        }

        if let (Some(host), Some(token)) = (&self.host, &self.token) {
            return Ok(Credentials {
                host: normalize_host(host),
                token: token.clone(),
            });
        }

        let host = std::env::var("DATABRICKS_HOST").map_err(|_| {
            AdminBridgeError::Configuration(
                "DATABRICKS_HOST environment variable not set".to_string(),
            )
        })?;
        let token = std::env::var("DATABRICKS_TOKEN").map_err(|_| {
            AdminBridgeError::Configuration(
                "DATABRICKS_TOKEN environment variable not set".to_string(),
            )
        })?;
        Ok(Credentials {
            host: normalize_host(&host),
            token,
        })
    }
}

fn databrickscfg_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("DATABRICKS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".databrickscfg"))
}

pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Look up `host` and `token` for a profile in an INI-style `.databrickscfg`.
pub fn credentials_from_profile(path: &Path, profile: &str) -> Result<Credentials> {
    let sections: HashMap<String, HashMap<String, String>> = ::config::Config::builder()
        .add_source(::config::File::from(path).format(::config::FileFormat::Ini))
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(|e| {
            AdminBridgeError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

    // section names may come back lowercased
    let section = sections
        .get(profile)
        .or_else(|| sections.get(&profile.to_lowercase()))
        .ok_or_else(|| {
            AdminBridgeError::Configuration(format!(
                "profile '{}' not found in {}",
                profile,
                path.display()
            ))
        })?;

    let host = section.get("host").ok_or_else(|| {
        AdminBridgeError::Configuration(format!("profile '{}' has no host", profile))
    })?;
    let token = section.get("token").ok_or_else(|| {
        AdminBridgeError::Configuration(format!("profile '{}' has no token", profile))
    })?;

    Ok(Credentials {
        host: normalize_host(host),
        token: token.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AdminBridgeConfig::default();
        assert_eq!(config.usage_table, "billing.usage_events");
        assert_eq!(config.budget_table, "billing.budgets");
        assert_eq!(config.audit_table, "system.access.audit");
        assert!(config.warehouse_id.is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AdminBridgeConfig =
            serde_json::from_str(r#"{"warehouse_id": "abc", "usage_table": "x.y"}"#).unwrap();
        assert_eq!(config.warehouse_id.as_deref(), Some("abc"));
        assert_eq!(config.usage_table, "x.y");
        assert_eq!(config.budget_table, DEFAULT_BUDGET_TABLE);
    }

    #[test]
    fn test_explicit_host_and_token() {
        let config = AdminBridgeConfig {
            host: Some("example.cloud.databricks.com/".to_string()),
            token: Some("dapi123".to_string()),
            ..Default::default()
        };
        let creds = config.resolve_credentials().unwrap();
        assert_eq!(creds.host, "https://example.cloud.databricks.com");
        assert_eq!(creds.token, "dapi123");
        assert!(!format!("{:?}", creds).contains("dapi123"));
    }

    #[test]
    fn test_profile_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[DEFAULT]\nhost = https://default.example.com\ntoken = t0\n\n# staging\n[staging]\nhost=staging.example.com\ntoken = t1"
        )
        .unwrap();

        let creds = credentials_from_profile(file.path(), "staging").unwrap();
        assert_eq!(creds.host, "https://staging.example.com");
        assert_eq!(creds.token, "t1");

        let err = credentials_from_profile(file.path(), "prod").unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("profile 'prod' not found"));
    }

    #[test]
    fn test_profile_without_token_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "; only a host\n[dev]\nhost = dev.example.com").unwrap();

        let err = credentials_from_profile(file.path(), "dev").unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert_eq!(err.to_string(), "configuration error: profile 'dev' has no token");
    }

    #[test]
    fn test_missing_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = credentials_from_profile(&dir.path().join("absent.cfg"), "dev").unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("failed to read"));
    }
}
