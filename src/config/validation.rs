//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check URL prefix lists and bundle prefix lists
//! - Validate route methods and regex sources
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{AppConfig, MappingEntry};
use crate::routing::RouteMethod;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("thirdPartyBundle.prefixes must not be empty")]
    NoBundlePrefixes,

    #[error("router.urlsPrefix lists '{0}' more than once")]
    DuplicatePrefix(String),

    #[error("route '{route}' has unknown method '{method}'")]
    UnknownMethod { route: String, method: String },

    #[error("route '{route}' has an invalid regexp source: {reason}")]
    InvalidRegex { route: String, reason: String },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.third_party_bundle.prefixes.is_empty() {
        errors.push(ValidationError::NoBundlePrefixes);
    }

    let mut seen = HashSet::new();
    for prefix in &config.router.urls_prefix {
        let trimmed = prefix.trim_matches('/');
        if !seen.insert(trimmed) {
            errors.push(ValidationError::DuplicatePrefix(trimmed.to_string()));
        }
    }

    for (key, entry) in &config.router.urls_mapping {
        let MappingEntry::Detailed(mapping) = entry else {
            continue;
        };
        if let Some(method) = &mapping.method {
            if method.parse::<RouteMethod>().is_err() {
                errors.push(ValidationError::UnknownMethod {
                    route: key.clone(),
                    method: method.clone(),
                });
            }
        }
        if mapping.kind.as_deref() == Some("regexp") {
            let source = mapping.source.as_deref().unwrap_or(key);
            if let Err(e) = regex::Regex::new(source) {
                errors.push(ValidationError::InvalidRegex {
                    route: key.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MappingConfig;

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::with_base_dir("/srv/app/");
        config.third_party_bundle.prefixes.clear();
        config.router.urls_prefix = vec!["admin".into(), "/admin/".into()];
        config.router.urls_mapping.insert(
            "r1".into(),
            MappingEntry::Detailed(MappingConfig {
                source: Some("^/(\\d+".into()),
                kind: Some("regexp".into()),
                method: Some("fetch".into()),
                ..Default::default()
            }),
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NoBundlePrefixes));
        assert!(errors.contains(&ValidationError::DuplicatePrefix("admin".into())));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::with_base_dir("/srv/app/")).is_ok());
    }
}
