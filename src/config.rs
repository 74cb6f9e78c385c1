//! # Configuration module
//!
//! This module provides [`OperatorConfig`], loaded the way the teacher's own
//! configuration struct is: a [`config::Config`] builder layering defaults,
//! an optional file, then environment variables with a framework-specific
//! prefix, deserialized via `serde`.

use std::{env, path::PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

// -----------------------------------------------------------------------------
// Constants

/// Default listen address for the liveness/metrics server.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to set default for key '{0}', {1}")]
    Default(String, ConfigError),
    #[error("failed to load configuration, {0}")]
    Build(ConfigError),
    #[error("failed to deserialize configuration, {0}")]
    Deserialize(ConfigError),
    #[error("failed to retrieve environment variable '{0}', {1}")]
    EnvironmentVariable(&'static str, env::VarError),
}

// -----------------------------------------------------------------------------
// RetryPolicyConfig: the serde-facing mirror of RetryPolicy

/// The on-wire shape of [`RetryPolicy`]. Kept as a separate struct so
/// `RetryPolicy` itself stays free of `serde` derives and its invariant
/// clamping (see `DESIGN.md`) runs uniformly regardless of where a value
/// came from.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct RetryPolicyConfig {
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(rename = "initialDelayMs")]
    pub initial_delay_ms: u64,
    #[serde(rename = "delayMultiplier")]
    pub delay_multiplier: f64,
}

impl From<RetryPolicyConfig> for RetryPolicy {
    fn from(config: RetryPolicyConfig) -> Self {
        RetryPolicy::new(
            config.max_attempts,
            std::time::Duration::from_millis(config.initial_delay_ms),
            config.delay_multiplier,
        )
    }
}

// -----------------------------------------------------------------------------
// OperatorConfig structure

/// `{watchNamespace?, watchLabelSelector?, retryPolicy, discardDuplicateGenerations}`
/// plus the host process's own listen address. Defaults match the external
/// configuration surface exactly: `maxAttempts` = 1, `initialDelayMs` = 0,
/// `delayMultiplier` = 2, `discardDuplicateGenerations` = true.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct OperatorConfig {
    #[serde(rename = "watchNamespace", default)]
    pub watch_namespace: Option<String>,
    #[serde(rename = "watchLabelSelector", default)]
    pub watch_label_selector: Option<String>,
    #[serde(rename = "retryPolicy")]
    pub retry_policy: RetryPolicyConfig,
    #[serde(rename = "discardDuplicateGenerations")]
    pub discard_duplicate_generations: bool,
    #[serde(rename = "listen", default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl OperatorConfig {
    /// Loads configuration from defaults, an optional file at `path`, and
    /// environment variables prefixed `RECONCILE_CORE_`.
    pub fn load(path: Option<PathBuf>) -> Result<Self, Error> {
        let mut builder = Config::builder()
            .set_default("retryPolicy.maxAttempts", 1)
            .map_err(|err| Error::Default("retryPolicy.maxAttempts".into(), err))?
            .set_default("retryPolicy.initialDelayMs", 0)
            .map_err(|err| Error::Default("retryPolicy.initialDelayMs".into(), err))?
            .set_default("retryPolicy.delayMultiplier", 2.0)
            .map_err(|err| Error::Default("retryPolicy.delayMultiplier".into(), err))?
            .set_default("discardDuplicateGenerations", true)
            .map_err(|err| Error::Default("discardDuplicateGenerations".into(), err))?
            .set_default("listen", DEFAULT_LISTEN)
            .map_err(|err| Error::Default("listen".into(), err))?
            .add_source(Environment::with_prefix("RECONCILE_CORE").separator("_"));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .build()
            .map_err(Error::Build)?
            .try_deserialize()
            .map_err(Error::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_with_no_file_match_the_external_interface() {
        let config = OperatorConfig::load(None).expect("defaults alone must load");

        assert_eq!(config.retry_policy.max_attempts, 1);
        assert_eq!(config.retry_policy.initial_delay_ms, 0);
        assert_eq!(config.retry_policy.delay_multiplier, 2.0);
        assert!(config.discard_duplicate_generations);
        assert!(config.watch_namespace.is_none());
        assert_eq!(config.listen, DEFAULT_LISTEN);
    }

    #[test]
    fn retry_policy_config_converts_into_a_clamped_retry_policy() {
        let policy: RetryPolicy = RetryPolicyConfig {
            max_attempts: 0,
            initial_delay_ms: 5,
            delay_multiplier: 0.1,
        }
        .into();

        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_multiplier(), 1.0);
    }
}
