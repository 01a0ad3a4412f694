use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{detection::sightengine::SightengineCredentials, error::Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[default]
    Mock,
    Sightengine,
    Huggingface,
    Hiveai,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

/// User preferences. Keys missing from a stored or submitted document take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub auto_optimize: bool,
    pub max_image_size: u32,
    pub default_quality: f64,
    pub enable_history: bool,
    pub enable_hashes: bool,
    pub theme: Theme,
    pub api_provider: ApiProvider,
    pub sightengine_api_user: String,
    pub sightengine_api_secret: String,
    pub huggingface_api_key: String,
    pub huggingface_model: String,
    pub hiveai_api_key: String,
    pub show_technical_details: bool,
    pub technical_detail_level: DetailLevel,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_optimize: true,
            max_image_size: 2048,
            default_quality: 0.9,
            enable_history: true,
            enable_hashes: true,
            theme: Theme::default(),
            api_provider: ApiProvider::default(),
            sightengine_api_user: String::new(),
            sightengine_api_secret: String::new(),
            huggingface_api_key: String::new(),
            huggingface_model: "vikhyatk/moondream2".to_string(),
            hiveai_api_key: String::new(),
            show_technical_details: true,
            technical_detail_level: DetailLevel::default(),
        }
    }
}

impl AppSettings {
    pub fn sightengine_credentials(&self) -> Option<SightengineCredentials> {
        SightengineCredentials::from_parts(
            Some(&self.sightengine_api_user),
            Some(&self.sightengine_api_secret),
        )
    }
}

/// Settings persisted as one JSON document.
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored values merged over the defaults. A missing or corrupt file
    /// yields the defaults.
    pub fn load(&self) -> AppSettings {
        let _guard = self.lock.lock();
        self.read()
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(settings)
    }

    pub fn reset(&self) -> Result<AppSettings> {
        let _guard = self.lock.lock();
        let defaults = AppSettings::default();
        self.write(&defaults)?;
        Ok(defaults)
    }

    fn read(&self) -> AppSettings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("could not read settings {}: {}", self.path.display(), err);
                }
                return AppSettings::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|err| {
            log::warn!("ignoring malformed settings {}: {}", self.path.display(), err);
            AppSettings::default()
        })
    }

    fn write(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        log::debug!("settings written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_merges_over_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"apiProvider":"sightengine","maxImageSize":1024}"#).unwrap();
        assert_eq!(settings.api_provider, ApiProvider::Sightengine);
        assert_eq!(settings.max_image_size, 1024);
        assert_eq!(settings.default_quality, 0.9);
        assert_eq!(settings.huggingface_model, "vikhyatk/moondream2");
        assert_eq!(settings.technical_detail_level, DetailLevel::Intermediate);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(AppSettings::default()).unwrap();
        assert_eq!(json["theme"], "light");
        assert_eq!(json["apiProvider"], "mock");
        assert_eq!(json["showTechnicalDetails"], true);
    }

    #[test]
    fn test_store_round_trip_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        assert_eq!(store.load(), AppSettings::default());

        let custom = AppSettings {
            theme: Theme::Dark,
            enable_history: false,
            ..AppSettings::default()
        };
        store.save(&custom).unwrap();
        assert_eq!(store.load(), custom);

        assert_eq!(store.reset().unwrap(), AppSettings::default());
        assert_eq!(store.load().theme, Theme::Light);
    }

    #[test]
    fn test_corrupt_file_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsStore::new(&path).load(), AppSettings::default());
    }

    #[test]
    fn test_blank_credentials_are_ignored() {
        let mut settings = AppSettings::default();
        assert!(settings.sightengine_credentials().is_none());
        settings.sightengine_api_user = "u".into();
        settings.sightengine_api_secret = "s".into();
        assert!(settings.sightengine_credentials().is_some());
    }
}
