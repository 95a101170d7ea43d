//! CLI configuration utilities

use anyhow::{Context as _, Result};
use notes_client::ClientConfig;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Session cookies persisted between invocations
pub const SESSION_FILE: &str = "session.json";

/// `--data-dir`, else `NOTES_STATE_DIR`, else the platform data dir
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(state_dir) = std::env::var("NOTES_STATE_DIR") {
            PathBuf::from(state_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notes")
        }
    })
}

/// Load the client configuration
///
/// An explicit `config_path` must exist; otherwise `<data_dir>/config.json`
/// is used when present. `base_url` overrides whatever was loaded.
pub fn load_client_config(
    config_path: Option<&Path>,
    data_dir: &Path,
    base_url: Option<&str>,
) -> Result<ClientConfig> {
    let default_path = data_dir.join(CONFIG_FILE);
    let path = match config_path {
        Some(path) => Some(path),
        None if default_path.exists() => Some(default_path.as_path()),
        None => None,
    };

    let mut config = ClientConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(base_url) = base_url {
        config.base_url = base_url.to_string();
        config.validate()?;
    }

    Ok(config)
}

/// Save a client configuration as JSON
pub fn save_client_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    save_client_config(&ClientConfig::default(), path)
}
