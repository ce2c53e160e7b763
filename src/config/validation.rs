//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting site hosts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RedirectsConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RedirectsConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("store.path must not be empty")]
    EmptyStorePath,

    #[error("content.base_url: `{0}` is not a valid URL")]
    InvalidBaseUrl(String),

    #[error("sites: host `{0}` is listed more than once")]
    DuplicateHost(String),

    #[error("sites: host must not be empty")]
    EmptyHost,

    #[error("admin.api_key must be changed from the placeholder when the admin API is enabled")]
    PlaceholderApiKey,
}

/// Check a parsed config.
pub fn validate_config(config: &RedirectsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::PlaceholderApiKey);
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }
    if config.content.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("content.timeout_ms"));
    }

    if config.store.path.trim().is_empty() {
        errors.push(ValidationError::EmptyStorePath);
    }

    if let Some(base_url) = &config.content.base_url {
        if url::Url::parse(base_url).is_err() {
            errors.push(ValidationError::InvalidBaseUrl(base_url.clone()));
        }
    }

    let mut hosts = HashSet::new();
    for site in &config.sites {
        let host = site.host.trim().to_ascii_lowercase();
        if host.is_empty() {
            errors.push(ValidationError::EmptyHost);
        } else if !hosts.insert(host.clone()) {
            errors.push(ValidationError::DuplicateHost(host));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SiteConfig;
    use crate::model::RootNodeId;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RedirectsConfig::default()), Ok(()));
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = RedirectsConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.store.path = " ".into();
        config.content.base_url = Some("::nope".into());
        config.admin.enabled = true;
        config.sites = vec![
            SiteConfig { host: "Example.com".into(), root_node_id: RootNodeId(1) },
            SiteConfig { host: "example.com".into(), root_node_id: RootNodeId(2) },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::ZeroTimeout("timeouts.request_secs")));
        assert!(errors.contains(&ValidationError::EmptyStorePath));
        assert!(errors.contains(&ValidationError::PlaceholderApiKey));
        assert!(errors.contains(&ValidationError::DuplicateHost("example.com".into())));
    }

    #[test]
    fn test_admin_key_only_checked_when_enabled() {
        let mut config = RedirectsConfig::default();
        assert!(validate_config(&config).is_ok());

        config.admin.enabled = true;
        config.admin.api_key = "a-real-key".into();
        assert!(validate_config(&config).is_ok());
    }
}
