use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    AnalysisConfig,
    detection::sightengine::{DEFAULT_ENDPOINT, SightengineCredentials},
    upload::UploadPolicy,
};

pub const ENV_API_USER: &str = "SIGHTENGINE_API_USER";
pub const ENV_API_SECRET: &str = "SIGHTENGINE_API_SECRET";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadPolicy,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub sightengine: SightengineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub history_path: PathBuf,
    pub settings_path: PathBuf,
    pub max_history_items: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("data/history.json"),
            settings_path: PathBuf::from("data/settings.json"),
            max_history_items: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SightengineConfig {
    pub api_user: Option<String>,
    pub api_secret: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for SightengineConfig {
    fn default() -> Self {
        Self {
            api_user: None,
            api_secret: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl SightengineConfig {
    pub fn credentials(&self) -> Option<SightengineCredentials> {
        SightengineCredentials::from_parts(self.api_user.as_deref(), self.api_secret.as_deref())
    }

    /// Fills credentials the file left blank from the process environment.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());

        if blank(&self.api_user) {
            self.api_user = lookup(ENV_API_USER);
        }
        if blank(&self.api_secret) {
            self.api_secret = lookup(ENV_API_SECRET);
        }
    }
}

/// Loads the optional config file. Without a path every section takes its
/// defaults; environment credentials are applied either way.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    config.sightengine.apply_env(|key| std::env::var(key).ok());
    validate(&config)?;

    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.upload.max_file_size == 0 {
        anyhow::bail!("upload.max_file_size must be > 0");
    }
    if config.upload.max_batch_files == 0 {
        anyhow::bail!("upload.max_batch_files must be > 0");
    }
    if config.upload.allowed_types.is_empty() {
        anyhow::bail!("upload.allowed_types must list at least one type");
    }

    if config.storage.max_history_items == 0 {
        anyhow::bail!("storage.max_history_items must be > 0");
    }

    if config.analysis.sample_size == 0 {
        anyhow::bail!("analysis.sample_size must be > 0");
    }
    if config.analysis.dominant_colors == 0 {
        anyhow::bail!("analysis.dominant_colors must be > 0");
    }

    if config.sightengine.timeout_secs == 0 {
        anyhow::bail!("sightengine.timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_takes_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.storage.max_history_items, 100);
        assert_eq!(config.upload.max_batch_files, 10);
        assert_eq!(config.analysis.sample_size, 200);
        assert_eq!(config.sightengine.endpoint, DEFAULT_ENDPOINT);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
[server]
bind = "0.0.0.0:8080"

[storage]
history_path = "/var/lib/insight/history.json"

[analysis]
seed = 7

[sightengine]
api_user = "user"
api_secret = "secret"
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(
            config.storage.history_path,
            PathBuf::from("/var/lib/insight/history.json")
        );
        assert_eq!(config.storage.settings_path, PathBuf::from("data/settings.json"));
        assert_eq!(config.analysis.seed, Some(7));
        assert_eq!(config.analysis.dominant_colors, 5);
        assert!(config.sightengine.credentials().is_some());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let config = parse_config("[upload]\nmax_batch_files = 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_batch_files"));

        let config = parse_config("[server]\nbind = \"\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_env_fills_only_missing_credentials() {
        let mut cfg = SightengineConfig {
            api_user: Some("from-file".into()),
            ..SightengineConfig::default()
        };
        cfg.apply_env(|key| Some(format!("env-{}", key)));

        assert_eq!(cfg.api_user.as_deref(), Some("from-file"));
        assert_eq!(cfg.api_secret.as_deref(), Some("env-SIGHTENGINE_API_SECRET"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/insight.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
