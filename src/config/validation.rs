//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool sizes, intervals)
//! - Check extension and URL shapes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::SyncConfig;

/// A single semantic problem found in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// An extension is a dot followed by one or more ASCII alphanumerics.
pub fn is_valid_extension(ext: &str) -> bool {
    ext.len() > 1
        && ext.starts_with('.')
        && ext[1..].chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let general = &config.general;
    if general.main_name.is_empty() {
        errors.push(ValidationError::new("general.main_name", "must not be empty"));
    }
    if !is_valid_extension(&general.main_extension) {
        errors.push(ValidationError::new(
            "general.main_extension",
            format!("'{}' is not a file extension", general.main_extension),
        ));
    }
    if general.scanning_extensions.is_empty() {
        errors.push(ValidationError::new(
            "general.scanning_extensions",
            "must not be empty",
        ));
    }
    for ext in &general.scanning_extensions {
        if !is_valid_extension(ext) {
            errors.push(ValidationError::new(
                "general.scanning_extensions",
                format!("'{}' is not a file extension", ext),
            ));
        }
    }

    let remote = &config.remote;
    if let Some(prefix) = &remote.server_url_prefix {
        if let Err(e) = url::Url::parse(prefix) {
            errors.push(ValidationError::new(
                "remote.server_url_prefix",
                format!("'{}' is not a valid URL: {}", prefix, e),
            ));
        }
    }
    if remote.local_server_name.is_empty() {
        errors.push(ValidationError::new("remote.local_server_name", "must not be empty"));
    }
    if remote.target_url_pattern.is_empty() {
        errors.push(ValidationError::new("remote.target_url_pattern", "must not be empty"));
    }
    if remote.extra_target_url_pattern.is_empty() {
        errors.push(ValidationError::new(
            "remote.extra_target_url_pattern",
            "must not be empty",
        ));
    }
    if remote.web_request_timeout_ms == 0 {
        errors.push(ValidationError::new("remote.web_request_timeout_ms", "must be > 0"));
    }
    if remote.web_request_interval_ms == 0 {
        errors.push(ValidationError::new("remote.web_request_interval_ms", "must be > 0"));
    }
    for ext in &remote.extra_resource_extensions {
        if !is_valid_extension(ext) {
            errors.push(ValidationError::new(
                "remote.extra_resource_extensions",
                format!("'{}' is not a file extension", ext),
            ));
        }
    }

    let pool = &config.http_pool;
    if pool.core_workers > 64 {
        errors.push(ValidationError::new("http_pool.core_workers", "must be within 0..=64"));
    }
    if !(4..=512).contains(&pool.max_workers) {
        errors.push(ValidationError::new("http_pool.max_workers", "must be within 4..=512"));
    }
    if !(1..=300).contains(&pool.worker_idle_secs) {
        errors.push(ValidationError::new(
            "http_pool.worker_idle_secs",
            "must be within 1..=300",
        ));
    }
    if pool.user_agent.is_empty() {
        errors.push(ValidationError::new("http_pool.user_agent", "must not be empty"));
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be > 0"));
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

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SyncConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SyncConfig::default();
        config.general.main_extension = "ini".into();
        config.http_pool.max_workers = 1;
        config.remote.server_url_prefix = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 3);
        assert!(fields.contains(&"general.main_extension"));
        assert!(fields.contains(&"http_pool.max_workers"));
        assert!(fields.contains(&"remote.server_url_prefix"));
    }

    #[test]
    fn test_extension_shape() {
        assert!(is_valid_extension(".ini"));
        assert!(is_valid_extension(".json5"));
        assert!(!is_valid_extension("."));
        assert!(!is_valid_extension("ini"));
        assert!(!is_valid_extension(".tar.gz"));
    }
}
