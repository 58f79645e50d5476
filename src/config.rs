//! Configuration System
//!
//! Layered configuration: merge-policy defaults, then the global file, then workspace
//! files, then `UNIFORM__SECTION__KEY` environment variables. Every section has
//! defaults, so an empty configuration is a valid one.

use crate::channel::ChannelOptions;
use crate::context::{self, ExecutionContext, HostEnvironment};
use crate::health::HealthSettings;
use crate::logging::LoggingConfig;
use crate::registry::RegistrySettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformConfig {
    #[serde(default)]
    pub context: ContextConfig,

    /// Defaults for every channel's delivery options
    #[serde(default)]
    pub channels: ChannelDefaults,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Skip detection and use this context
    #[serde(default)]
    pub execution_context: Option<String>,

    /// Allow worker transports from contexts that cannot host them by default
    #[serde(default)]
    pub dedicated_workers: Option<bool>,
}

impl ContextConfig {
    /// Host snapshot from the process environment with this section's overrides applied.
    pub fn host_environment(&self) -> HostEnvironment {
        let mut host = HostEnvironment::from_env();
        if let Some(name) = &self.execution_context {
            host.context_hint = Some(name.clone());
        }
        if self.dedicated_workers.is_some() {
            host.dedicated_workers = self.dedicated_workers;
        }
        host
    }

    /// Configured context if set and valid, otherwise the detected one.
    pub fn resolve(&self) -> ExecutionContext {
        self.execution_context
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or_else(context::detect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDefaults {
    /// Per-request timeout; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_delay_ms() -> u64 {
    250
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ChannelDefaults {
    pub fn to_options(&self) -> ChannelOptions {
        ChannelOptions {
            timeout_ms: Some(self.timeout_ms),
            retries: Some(self.retries),
            retry_delay_ms: Some(self.retry_delay_ms),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Consecutive failures before a channel reads unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_failure_threshold() -> u32 {
    1
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settings(&self) -> HealthSettings {
        HealthSettings {
            failure_threshold: self.failure_threshold,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

impl UniformConfig {
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            health_interval: self.health.interval(),
            defaults: self.channels.to_options(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(name) = &self.context.execution_context {
            if let Err(e) = name.parse::<ExecutionContext>() {
                errors.push(ValidationError::Context(e));
            }
        }

        if self.health.interval_ms == 0 {
            errors.push(ValidationError::Health(
                "interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.health.failure_threshold == 0 {
            errors.push(ValidationError::Health(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.health.probe_timeout_ms == 0 {
            errors.push(ValidationError::Health(
                "probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.health.probe_timeout_ms > self.health.interval_ms {
            errors.push(ValidationError::Health(format!(
                "probe_timeout_ms ({}) must not exceed interval_ms ({})",
                self.health.probe_timeout_ms, self.health.interval_ms
            )));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Context(String),
    Health(String),
    Logging(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Context(msg) => write!(f, "Context: {}", msg),
            ValidationError::Health(msg) => write!(f, "Health: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}
