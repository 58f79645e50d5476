//! Environment source: UNIFORM__SECTION__KEY, e.g. UNIFORM__HEALTH__INTERVAL_MS=10000

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("UNIFORM")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
