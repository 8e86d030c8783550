//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::merge::deep_merge;
use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Conversion error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration [baseDir] is missed")]
    MissingBaseDir,

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate the application configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment-aware loader for free-form configuration trees (bundle
/// configs).
pub trait ConfigSource: Send + Sync {
    fn load(&self, dir: &Path, env: &str) -> Result<Value, ConfigError>;
}

/// Reads `config.toml` from a directory and merges `config.<env>.toml` over
/// it. A missing directory or file contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct TomlDirSource;

impl TomlDirSource {
    fn read_table(path: &Path) -> Result<Option<Value>, ConfigError> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(serde_json::to_value(table)?))
    }
}

impl ConfigSource for TomlDirSource {
    fn load(&self, dir: &Path, env: &str) -> Result<Value, ConfigError> {
        let mut tree = Value::Object(Map::new());
        for file in ["config.toml".to_string(), format!("config.{}.toml", env)] {
            if let Some(layer) = Self::read_table(&dir.join(file))? {
                deep_merge(&mut tree, layer);
            }
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_env_layer_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[default]\ncontrollerName = \"home\"\n[core.\"http.client\"]\ntimeout = 30\n",
        )
        .unwrap();
        fs::write(dir.path().join("config.dev.toml"), "[default]\nactionName = \"list\"\n").unwrap();

        let tree = TomlDirSource.load(dir.path(), "dev").unwrap();
        assert_eq!(tree["default"], json!({"controllerName": "home", "actionName": "list"}));
        assert_eq!(tree["core"]["http.client"]["timeout"], json!(30));

        let prod = TomlDirSource.load(dir.path(), "prod").unwrap();
        assert_eq!(prod["default"], json!({"controllerName": "home"}));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tree = TomlDirSource.load(Path::new("/nonexistent/config/"), "prod").unwrap();
        assert_eq!(tree, json!({}));
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "baseDir = [").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }
}
