//! Configuration validation
//!
//! Checks that a loaded configuration can actually drive a sync or a
//! webhook server before any network or disk work starts.

use super::mirror_config::MirrorConfig;
use crate::MirrorError;
use std::net::SocketAddr;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// What the configuration is about to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Sync,
    Serve,
    Inspect,
}

/// Validate a configuration for the given purpose
pub fn validate_config(config: &MirrorConfig, purpose: Purpose) -> ValidationResult {
    let mut errors = Vec::new();

    let api_url = config.github.api_url.trim();
    if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
        errors.push(ValidationError::new(
            "github.api_url",
            format!("Must be an http(s) URL, got '{}'", config.github.api_url),
        ));
    }

    if config.github.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "github.timeout_secs",
            "Timeout must be greater than 0",
        ));
    }

    if config.store.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("store.path", "Path must not be empty"));
    }

    if purpose == Purpose::Sync && config.github.token.is_none() {
        errors.push(ValidationError::new(
            "github.token",
            "A token is required for bulk sync (set GITHUB_TOKEN)",
        ));
    }

    if purpose == Purpose::Serve {
        if config.webhook.secret.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::new(
                "webhook.secret",
                "A webhook secret is required (set GH_WEBHOOK_SECRET)",
            ));
        }
        if config.webhook.bind.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "webhook.bind",
                format!("Invalid socket address '{}'", config.webhook.bind),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// [`validate_config`] folded into a single crate error
pub fn validate_config_result(config: &MirrorConfig, purpose: Purpose) -> crate::Result<()> {
    validate_config(config, purpose).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        MirrorError::Config(messages.join("; "))
    })
}
