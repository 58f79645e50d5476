//! Error types for the channel orchestration layer.

use crate::context::ExecutionContext;
use crate::transport::TransportKind;
use thiserror::Error;

/// Failure of a single `request()` call.
///
/// Every variant is local to the call that produced it: a failing request never
/// poisons its channel, its scope, or the health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Transport unavailable for channel '{channel}': {transport} is not supported in {context} context ({reason})")]
    TransportUnavailable {
        channel: String,
        transport: TransportKind,
        context: ExecutionContext,
        reason: String,
    },

    #[error("Delivery failed on channel '{channel}': {message}")]
    DeliveryFailure { channel: String, message: String },

    #[error("Request '{method}' on channel '{channel}' timed out after {after_ms}ms")]
    Timeout {
        channel: String,
        method: String,
        after_ms: u64,
    },

    #[error("Request on channel '{channel}' was cancelled: channel closed")]
    Cancelled { channel: String },
}

/// Coarse classification of a [`ChannelError`], useful for callers that only need to
/// branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TransportUnavailable,
    DeliveryFailure,
    Timeout,
    Cancelled,
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::TransportUnavailable { .. } => ErrorKind::TransportUnavailable,
            ChannelError::DeliveryFailure { .. } => ErrorKind::DeliveryFailure,
            ChannelError::Timeout { .. } => ErrorKind::Timeout,
            ChannelError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Only delivery failures are worth re-issuing; everything else is either
    /// permanent or already exhausted the caller's budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::DeliveryFailure { .. })
    }

    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        ChannelError::DeliveryFailure {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(channel: impl Into<String>) -> Self {
        ChannelError::Cancelled {
            channel: channel.into(),
        }
    }
}

/// Configuration, logging and CLI errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
