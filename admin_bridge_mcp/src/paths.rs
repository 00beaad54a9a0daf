use std::path::PathBuf;

const APP_DIR: &str = ".admin_bridge";

/// `~/.admin_bridge`, or a relative `.admin_bridge` when no home directory is known.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(APP_DIR))
}

pub fn config_path() -> PathBuf {
    app_dir().join("config.json")
}

pub fn session_log_dir() -> PathBuf {
    app_dir().join("logs")
}
