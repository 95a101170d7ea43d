//! Client configuration

use crate::error::ClientError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "NOTES";

/// Notes API client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin (and optional base path) of the notes API
    pub base_url: String,

    /// Per-request timeout in seconds (0 disables it)
    pub request_timeout_secs: u64,

    /// Upper bound on a session refresh in seconds (0 disables it)
    pub refresh_timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Where a forced logout sends the user
    pub login_path: String,

    /// Session refresh endpoint
    pub refresh_path: String,

    /// Endpoints whose 401 is an ordinary answer rather than a stale session
    pub public_endpoints: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            refresh_timeout_secs: 30,
            user_agent: concat!("notes-client/", env!("CARGO_PKG_VERSION")).to_string(),
            login_path: "/".to_string(),
            refresh_path: "/token/refresh/".to_string(),
            public_endpoints: vec![
                "/token/".to_string(),
                "/register/".to_string(),
                "/me/".to_string(),
            ],
        }
    }
}

impl ClientConfig {
    /// Configuration for a specific origin, everything else default
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration: defaults, then an optional file, then `NOTES_*`
    /// environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("public_endpoints"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(ClientError::Configuration(
                "refresh_path must start with '/'".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.refresh_timeout_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
