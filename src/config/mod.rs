//! Configuration system
//!
//! Loads ~/.config/ghmirror/config.yaml with support for:
//! - GitHub API root and token
//! - Document store location
//! - Webhook bind address and secret
//! - Rate governor tuning

mod mirror_config;
pub mod validation;

pub use mirror_config::{
    GitHubConfig, MirrorConfig, RateLimitConfig, StoreConfig, WebhookConfig, TOKEN_ENV,
    WEBHOOK_SECRET_ENV,
};
pub use validation::{validate_config, validate_config_result, Purpose, ValidationError};
