//! Settings file model

use crate::error::{ConfigError, Result};
use nicflow_core::{ExecutorConfig, ResourceTimeouts, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Contents of `nicflow.yaml`; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NicflowConfig {
    pub api: ApiSettings,
    pub timeouts: TimeoutSettings,
    /// Pause between two task status polls
    pub task_poll_interval_ms: Option<u64>,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub project_id: Option<u64>,
    pub region_id: Option<u64>,
    /// Name of the environment variable holding the API token
    pub token_env: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            project_id: None,
            region_id: None,
            token_env: "GCORE_API_TOKEN".to_string(),
        }
    }
}

/// Task wait bounds in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub vm: Option<u64>,
    pub bare_metal: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
}

impl NicflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.multiplier.is_some_and(|m| !m.is_finite() || m < 1.0) {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be at least 1.0".to_string(),
            ));
        }
        let policy = self.retry_policy();
        if policy.initial_delay > policy.max_delay {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        if self.task_poll_interval_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "task_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.timeouts.vm == Some(0) || self.timeouts.bare_metal == Some(0) {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            initial_delay: self
                .retry
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: self
                .retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            backoff_multiplier: self.retry.multiplier.unwrap_or(defaults.backoff_multiplier),
        }
    }

    /// Executor settings with file values over built-in defaults
    pub fn executor_config(&self) -> ExecutorConfig {
        let defaults = ExecutorConfig::default();
        ExecutorConfig {
            timeouts: ResourceTimeouts {
                vm: self
                    .timeouts
                    .vm
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeouts.vm),
                bare_metal: self
                    .timeouts
                    .bare_metal
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeouts.bare_metal),
            },
            poll_interval: self
                .task_poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            retry: self.retry_policy(),
        }
    }

    /// API token from the configured environment variable
    pub fn api_token(&self) -> Result<String> {
        match std::env::var(&self.api.token_env) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken(self.api.token_env.clone())),
        }
    }
}
