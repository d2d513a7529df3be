//! Dashboard configuration.
//!
//! Layering: built-in defaults, then an optional YAML file, then environment
//! overrides. The YAML document is merged key by key over the defaults so a
//! file only needs the settings it changes.

use crate::cache::DEFAULT_TTL_SECONDS;
use crate::errors::{AppError, AppResult};
use crate::models::{DEFAULT_LOCATION_COUNT, DEFAULT_TOP_N, MAX_TOP_N, MIN_TOP_N};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "GOLD_DASHBOARD_CONFIG";
pub const WAREHOUSE_PATH_ENV: &str = "GOLD_DASHBOARD_WAREHOUSE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub warehouse_path: PathBuf,
    pub cache_ttl_seconds: u64,
    pub default_top_n: u32,
    pub default_location_count: usize,
    pub log_dir: Option<PathBuf>,
    pub refresh_interval_seconds: Option<u64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            warehouse_path: PathBuf::from("gold.db"),
            cache_ttl_seconds: DEFAULT_TTL_SECONDS as u64,
            default_top_n: DEFAULT_TOP_N,
            default_location_count: DEFAULT_LOCATION_COUNT,
            log_dir: None,
            refresh_interval_seconds: None,
        }
    }
}

impl DashboardConfig {
    /// Loads from `explicit`, or the file named by `GOLD_DASHBOARD_CONFIG`,
    /// or defaults when neither is set.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_PATH_ENV).filter(|value| !value.trim().is_empty()).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|error| {
                    AppError::Config(format!("unable to read config file {}: {}", path.display(), error))
                })?;
                tracing::debug!(path = %path.display(), "loaded dashboard config file");
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };

        if let Some(warehouse) = env(WAREHOUSE_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            config.warehouse_path = PathBuf::from(warehouse.trim());
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document over the defaults. An empty document yields
    /// the defaults.
    pub fn from_yaml(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let update: serde_json::Value = serde_yaml::from_str(raw)?;
        let mut merged = serde_json::to_value(Self::default())?;
        if !update.is_null() {
            if !update.is_object() {
                return Err(AppError::Config("config document must be a mapping".to_string()));
            }
            merge_json(&mut merged, update);
        }
        serde_json::from_value(merged).map_err(|error| AppError::Config(error.to_string()))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.cache_ttl_seconds == 0 {
            return Err(AppError::Config("cache_ttl_seconds must be greater than zero".to_string()));
        }
        if i64::try_from(self.cache_ttl_seconds).is_err() {
            return Err(AppError::Config("cache_ttl_seconds is too large".to_string()));
        }
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&self.default_top_n) {
            return Err(AppError::Config(format!(
                "default_top_n must be between {} and {}",
                MIN_TOP_N, MAX_TOP_N
            )));
        }
        if self.default_location_count == 0 {
            return Err(AppError::Config("default_location_count must be at least 1".to_string()));
        }
        if self.refresh_interval_seconds == Some(0) {
            return Err(AppError::Config(
                "refresh_interval_seconds must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.cache_ttl_seconds).unwrap_or(DEFAULT_TTL_SECONDS))
    }

    pub fn refresh_interval(&self) -> Option<std::time::Duration> {
        self.refresh_interval_seconds.map(std::time::Duration::from_secs)
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DashboardConfig, CONFIG_PATH_ENV, WAREHOUSE_PATH_ENV};
    use crate::errors::AppError;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = DashboardConfig::load_with(None, env(&[])).expect("config");
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.cache_ttl_seconds, 3_600);
        assert_eq!(config.default_top_n, 20);
        assert_eq!(config.default_location_count, 3);
        assert_eq!(config.refresh_interval(), None);
    }

    #[test]
    fn yaml_file_overrides_only_named_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dashboard.yaml");
        std::fs::write(&path, "cache_ttl_seconds: 120\ndefault_top_n: 50\nlog_dir: /tmp/gold-logs\n")
            .expect("write config");

        let config = DashboardConfig::load_with(Some(&path), env(&[])).expect("config");
        assert_eq!(config.cache_ttl_seconds, 120);
        assert_eq!(config.cache_ttl().num_seconds(), 120);
        assert_eq!(config.default_top_n, 50);
        assert_eq!(config.default_location_count, 3);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/gold-logs")));
    }

    #[test]
    fn env_selects_file_and_overrides_warehouse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dashboard.yaml");
        std::fs::write(&path, "warehouse_path: from-file.db\nrefresh_interval_seconds: 30\n").expect("write config");

        let config = DashboardConfig::load_with(
            None,
            env(&[
                (CONFIG_PATH_ENV, path.display().to_string()),
                (WAREHOUSE_PATH_ENV, "from-env.db".to_string()),
            ]),
        )
        .expect("config");
        assert_eq!(config.warehouse_path, PathBuf::from("from-env.db"));
        assert_eq!(config.refresh_interval_seconds, Some(30));
    }

    #[test]
    fn rejects_invalid_values() {
        for raw in [
            "cache_ttl_seconds: 0",
            "default_top_n: 4",
            "default_top_n: 101",
            "default_location_count: 0",
            "refresh_interval_seconds: 0",
        ] {
            let config = DashboardConfig::from_yaml(raw).expect("parse");
            assert!(matches!(config.validate(), Err(AppError::Config(_))), "{raw}");
        }
        assert!(matches!(DashboardConfig::from_yaml("- a\n- b\n"), Err(AppError::Config(_))));
        assert!(matches!(DashboardConfig::from_yaml("cache_ttl_seconds: soon"), Err(AppError::Config(_))));
        assert_eq!(DashboardConfig::from_yaml("").expect("empty"), DashboardConfig::default());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.yaml");
        let result = DashboardConfig::load_with(Some(&missing), env(&[]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
