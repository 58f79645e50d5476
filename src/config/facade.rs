//! Entry point for building a [`UniformConfig`] from its layered sources.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::UniformConfig;
use crate::error::ApiError;
use config::{File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults only
    pub fn default() -> UniformConfig {
        UniformConfig::default()
    }

    /// Load every layer for `workspace_root`.
    ///
    /// Order, lowest to highest precedence: defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{UNIFORM_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<UniformConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: UniformConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<UniformConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let config = builder
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Path of the global config file, whether or not it exists.
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Deserialize a config from TOML text layered over the defaults.
    pub fn from_toml_str(text: &str) -> Result<UniformConfig, ApiError> {
        let config = merge_policy::builder_with_defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
