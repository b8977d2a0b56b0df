use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::types::{AppConfig, DataOptions};
use super::validation::validate_config;
use crate::core::errors::ConfigError;

/// Resolves the effective configuration: built-in defaults, then the YAML
/// config file, then caller-supplied overrides (usually CLI flags).
#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        self.paths.config_path.clone()
    }

    /// Raw file contents as a JSON object; a missing file is an empty object.
    pub fn load_file(&self) -> Result<Value, ConfigError> {
        load_yaml_file(&self.config_path())
    }

    pub fn load(&self, overrides: &Value) -> Result<AppConfig, ConfigError> {
        let defaults = serde_json::to_value(AppConfig::default())
            .map_err(|e| ConfigError::invalid("defaults", e.to_string()))?;
        let file = self.load_file()?;
        let merged = deep_merge(&deep_merge(&defaults, &file), overrides);

        let config: AppConfig =
            serde_json::from_value(merged).map_err(|e| ConfigError::Parse {
                path: self.config_path(),
                message: e.to_string(),
            })?;
        validate_config(&config)?;
        tracing::debug!(path = %self.config_path().display(), "configuration loaded");
        Ok(config)
    }

    /// Dataset options, falling back to the discovered data directory.
    pub fn data_options(&self, config: &AppConfig) -> DataOptions {
        DataOptions {
            datapath: config
                .data
                .datapath
                .clone()
                .unwrap_or_else(|| self.paths.data_dir.clone()),
        }
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

pub(crate) fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::config::types::ReplySource;

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(Arc::new(AppPaths {
            data_dir: dir.to_path_buf(),
            log_dir: dir.join("logs"),
            config_path: dir.join("config.yml"),
        }))
    }

    #[test]
    fn deep_merge_overrides_nested_keys_only() {
        let base = json!({"agent": {"use_knowledge": true, "truncate": 1024}});
        let over = json!({"agent": {"truncate": null}});
        let merged = deep_merge(&base, &over);
        assert_eq!(merged, json!({"agent": {"use_knowledge": true, "truncate": null}}));
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let config = service.load(&json!({})).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(service.data_options(&config).datapath, dir.path());
    }

    #[test]
    fn overrides_beat_file_values() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "agent:\n  knowledge_dropout: 0.1\n  use_reply: model\ndata:\n  datapath: /srv/data\n",
        )
        .unwrap();
        let service = service_in(dir.path());
        let config = service
            .load(&json!({"agent": {"knowledge_dropout": 0.0}}))
            .unwrap();
        assert_eq!(config.agent.knowledge_dropout, 0.0);
        assert_eq!(config.agent.use_reply, ReplySource::Model);
        assert_eq!(
            service.data_options(&config).datapath,
            PathBuf::from("/srv/data")
        );
    }

    #[test]
    fn invalid_dropout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "agent:\n  knowledge_dropout: 1.5\n",
        )
        .unwrap();
        let err = service_in(dir.path()).load(&json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
