//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("channels.timeout_ms", 30_000_i64)?
        .set_default("channels.retries", 0_i64)?
        .set_default("channels.retry_delay_ms", 250_i64)?
        .set_default("health.interval_ms", 30_000_i64)?
        .set_default("health.probe_timeout_ms", 5_000_i64)?
        .set_default("health.failure_threshold", 1_i64)
}
