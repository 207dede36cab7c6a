//! Runtime configuration for the cemetery map.
//!
//! Loaded from `cemetery_config.json`, overridable through
//! `CEMETERY_CONFIG_PATH`.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exhumation::OfficeNotice;

pub const BUILTIN_CEMETERY_CONFIG: &str = include_str!("data/cemetery_config.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CemeteryConfig {
    pub repaint_interval_ms: u64,
    pub map_asset: PathBuf,
    pub fallback_map_asset: Option<PathBuf>,
    pub plots_path: Option<PathBuf>,
    pub request_store_path: PathBuf,
    pub event_capacity: usize,
    pub notifications: NotificationConfig,
}

impl Default for CemeteryConfig {
    fn default() -> Self {
        Self {
            repaint_interval_ms: 3_000,
            map_asset: PathBuf::from("assets/cemetery_map.svg"),
            fallback_map_asset: None,
            plots_path: None,
            request_store_path: PathBuf::from("data/exhumation_requests.json"),
            event_capacity: 256,
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub office_recipient: String,
    pub request_template: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            office_recipient: String::new(),
            request_template: "exhumation_request_received".to_string(),
        }
    }
}

impl CemeteryConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CEMETERY_CONFIG)
                .expect("builtin cemetery config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = CemeteryConfig::from_json_str(&contents)?;
        Ok(config)
    }

    /// Interval of the background repaint; never below 100ms.
    pub fn repaint_interval(&self) -> Duration {
        Duration::from_millis(self.repaint_interval_ms.max(100))
    }

    /// `None` when no office recipient is configured.
    pub fn office_notice(&self) -> Option<OfficeNotice> {
        let recipient = self.notifications.office_recipient.trim();
        if recipient.is_empty() {
            return None;
        }
        Some(OfficeNotice {
            recipient: recipient.to_string(),
            template_id: self.notifications.request_template.clone(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse cemetery config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read cemetery config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the active configuration came from; `None` means builtin.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    path: Option<PathBuf>,
}

impl ConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load configuration from `CEMETERY_CONFIG_PATH` or the default path,
/// falling back to the builtin copy.
pub fn load_config_from_env() -> (Arc<CemeteryConfig>, ConfigMetadata) {
    let override_path = env::var("CEMETERY_CONFIG_PATH").ok().map(PathBuf::from);
    load_config(override_path)
}

pub fn load_config(override_path: Option<PathBuf>) -> (Arc<CemeteryConfig>, ConfigMetadata) {
    let path = override_path.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/cemetery_config.json")
    });

    match CemeteryConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "cemetery::config",
                path = %path.display(),
                "cemetery_config.loaded=file"
            );
            return (Arc::new(config), ConfigMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "cemetery::config",
                path = %path.display(),
                error = %err,
                "cemetery_config.load_failed"
            );
        }
    }

    let config = CemeteryConfig::builtin();
    tracing::info!(target: "cemetery::config", "cemetery_config.loaded=builtin");
    (config, ConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = CemeteryConfig::builtin();
        assert_eq!(config.repaint_interval(), Duration::from_secs(3));
        assert_eq!(config.event_capacity, 256);
        assert!(config.office_notice().is_some());
    }

    #[test]
    fn partial_files_use_defaults() {
        let config = CemeteryConfig::from_json_str(r#"{"repaint_interval_ms": 10}"#)
            .expect("partial config");
        assert_eq!(config.repaint_interval(), Duration::from_millis(100));
        assert_eq!(config.request_store_path, PathBuf::from("data/exhumation_requests.json"));
        assert!(config.office_notice().is_none());
    }

    #[test]
    fn unreadable_override_falls_back_to_builtin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, metadata) = load_config(Some(dir.path().join("missing.json")));
        assert!(metadata.path().is_none());
        assert_eq!(*config, *CemeteryConfig::builtin());

        let path = dir.path().join("cemetery.json");
        fs::write(&path, r#"{"event_capacity": 16}"#).expect("write config");
        let (config, metadata) = load_config(Some(path.clone()));
        assert_eq!(metadata.path(), Some(&path));
        assert_eq!(config.event_capacity, 16);
    }
}
