//! CLI route: single route table and run context.

use crate::cli::parse::{Commands, ConfigFormat, OutputFormat};
use crate::cli::presentation::{
    format_context_json, format_context_text, format_frame_json, format_frame_text,
    format_validation_errors,
};
use crate::config::{ConfigLoader, UniformConfig};
use crate::error::ApiError;
use crate::factory::ChannelFactory;
use crate::frame::{normalize_frame, normalize_frame_from, NetworkTransport};
use crate::transport::TransportKind;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: UniformConfig,
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: UniformConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &UniformConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Normalize {
                frame,
                source,
                transport,
                format,
            } => {
                let text = match frame.as_deref() {
                    None | Some("-") => read_stdin()?,
                    Some(text) => text.to_string(),
                };
                self.normalize(&text, source, transport.as_deref(), *format)
            }
            Commands::Context { format } => Ok(self.context(*format)),
            Commands::Config { format, validate } => self.show_config(*format, *validate),
        }
    }

    fn normalize(
        &self,
        text: &str,
        source: &str,
        transport: Option<&str>,
        format: OutputFormat,
    ) -> Result<String, ApiError> {
        let raw: Value = serde_json::from_str(text.trim())
            .map_err(|e| ApiError::InvalidFrame(e.to_string()))?;

        let frame = match transport {
            Some(name) => {
                let transport: NetworkTransport = name.parse().map_err(ApiError::InvalidFrame)?;
                normalize_frame_from(transport, &raw, source)
            }
            None => normalize_frame(&raw, source),
        };
        info!(frame = %frame.log_key(), "Normalized frame");

        Ok(match format {
            OutputFormat::Json => format_frame_json(&frame),
            OutputFormat::Text => format_frame_text(&frame),
        })
    }

    fn context(&self, format: OutputFormat) -> String {
        let host = self.config.context.host_environment();
        let factory = ChannelFactory::from_config(&self.config.context);
        let context = factory.context();

        let transports = [
            TransportKind::InProcess,
            TransportKind::Worker,
            TransportKind::Extension,
        ]
        .map(|kind| (kind, factory.supports(kind)));
        debug!(context = %context, "Resolved execution context");

        match format {
            OutputFormat::Json => format_context_json(context, &host, &transports),
            OutputFormat::Text => format_context_text(context, &host, &transports),
        }
    }

    fn show_config(&self, format: ConfigFormat, validate: bool) -> Result<String, ApiError> {
        if validate {
            return match self.config.validate() {
                Ok(()) => Ok(format!(
                    "Configuration for {} is valid",
                    self.workspace_root.display()
                )),
                Err(errors) => Err(ApiError::ConfigError(format_validation_errors(&errors))),
            };
        }

        match format {
            ConfigFormat::Toml => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
            ConfigFormat::Json => serde_json::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        }
    }
}

fn read_stdin() -> Result<String, ApiError> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}
