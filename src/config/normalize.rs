//! Normalization of a freshly loaded configuration.
//!
//! Fills every default that depends on `baseDir`, canonicalizes URL prefixes
//! and discovers in-tree bundles by scanning the bundles directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::loader::ConfigError;
use crate::config::schema::{AppConfig, DirConfig};

/// Normalize `config` in place. Fails when `baseDir` is missing.
pub fn normalize(config: &mut AppConfig) -> Result<(), ConfigError> {
    let base_dir = config.base_dir.clone().ok_or(ConfigError::MissingBaseDir)?;

    if config.name.is_empty() {
        config.name = "bootjs".to_string();
    }
    if config.env.is_empty() {
        config.env = "prod".to_string();
    }

    let defaults = &mut config.router.default;
    if defaults.controller_name.is_empty() {
        defaults.controller_name = "index".to_string();
    }
    if defaults.action_name.is_empty() {
        defaults.action_name = "index".to_string();
    }

    let layout = &mut config.layout;
    fill_dir(&mut layout.controllers, &base_dir, "controllers");
    fill_dir(&mut layout.configs, &base_dir, "config");
    fill_dir(&mut layout.models, &base_dir, "models");
    fill_dir(&mut layout.views, &base_dir, "views");
    fill_dir(&mut layout.bundles, &base_dir, "bundles");
    fill_dir(&mut layout.middlewares, &base_dir, "middlewares");

    if let Some(bundles_dir) = layout.bundles.base_dir.clone() {
        for (name, path) in scan_bundle_dirs(&bundles_dir)? {
            let entry = config.bundles.entry(name).or_default();
            entry.base_dir = Some(path);
        }
    }

    config.router.urls_prefix = config
        .router
        .urls_prefix
        .iter()
        .map(|prefix| normalize_prefix(prefix))
        .collect();

    if config.auth.module.is_empty() {
        config.auth.module = "bootjs-auth".to_string();
    }
    if config.exception.module.is_empty() {
        config.exception.module = "bootjs-exception".to_string();
    }

    Ok(())
}

fn fill_dir(dir: &mut DirConfig, base_dir: &Path, sub: &str) {
    if dir.base_dir.is_none() {
        dir.base_dir = Some(base_dir.join(sub));
    }
}

/// Strip one leading `/` and every trailing `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .strip_prefix('/')
        .unwrap_or(prefix)
        .trim_end_matches('/')
        .to_string()
}

/// Non-hidden sub-directories of `root`, with canonical paths. A missing root
/// yields nothing.
fn scan_bundle_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>, ConfigError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let io_err = |source| ConfigError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        let path = fs::canonicalize(entry.path()).map_err(io_err)?;
        found.push((name, path));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_base_dir() {
        let mut config = AppConfig::default();
        assert!(matches!(normalize(&mut config), Err(ConfigError::MissingBaseDir)));
    }

    #[test]
    fn test_fills_layout_and_prefixes() {
        let mut config = AppConfig::with_base_dir("/srv/app");
        config.router.urls_prefix = vec!["/admin/".into(), "api//".into(), "m/v1".into()];
        config.router.default.action_name.clear();
        normalize(&mut config).unwrap();

        assert_eq!(
            config.layout.controllers.base_dir.as_deref(),
            Some(Path::new("/srv/app/controllers"))
        );
        assert_eq!(config.layout.configs.base_dir.as_deref(), Some(Path::new("/srv/app/config")));
        assert_eq!(config.router.urls_prefix, vec!["admin", "api", "m/v1"]);
        assert_eq!(config.router.default.action_name, "index");
    }

    #[test]
    fn test_discovers_in_tree_bundles() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bundles/shop/controllers")).unwrap();
        fs::create_dir_all(dir.path().join("bundles/.cache")).unwrap();
        fs::write(dir.path().join("bundles/README"), "not a bundle").unwrap();

        let mut config = AppConfig::with_base_dir(dir.path());
        normalize(&mut config).unwrap();

        assert_eq!(config.bundles.len(), 1);
        let shop = &config.bundles["shop"];
        assert_eq!(
            shop.base_dir.as_deref(),
            Some(fs::canonicalize(dir.path().join("bundles/shop")).unwrap().as_path())
        );
    }
}
