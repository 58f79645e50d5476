//! Channel Contract
//!
//! A channel is a request/response handle addressed to one named logical destination
//! and backed by exactly one transport. Every variant (in-process, worker-hosted,
//! extension messaging, no-op) exposes the same [`Channel`] shape, so callers never
//! branch on the transport.

use crate::context::ExecutionContext;
use crate::error::ChannelError;
use crate::telemetry::{new_message_id, now_millis};
use crate::transport::{TransportDescriptor, TransportKind};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;

/// Operation names carried in [`Envelope::method`].
pub mod methods {
    /// Liveness probe; every destination must answer it.
    pub const PING: &str = "ping";
    pub const CAPTURE: &str = "capture";
    pub const PROCESS_TEXT: &str = "processText";
    pub const DO_COPY: &str = "doCopy";
    pub const RECOGNIZE: &str = "recognize";
    pub const RECOGNIZE_WITH_CONTEXT: &str = "recognizeWithContext";
}

/// Eventual result of a request. The send has already been initiated by the time the
/// future is handed back; awaiting it only waits for the correlated response.
pub type ResponseFuture = BoxFuture<'static, Result<Value, ChannelError>>;

/// How a transport announces that its destination can accept requests.
pub enum Readiness {
    /// Requests can flow as soon as the channel exists.
    Immediate,
    /// Flips to `true` once the destination says it is connected.
    Pending(watch::Receiver<bool>),
}

/// Uniform request/response capability.
pub trait Channel: Send + Sync {
    /// Logical destination name.
    fn name(&self) -> &str;

    fn transport(&self) -> TransportKind;

    /// Send `method` with `args` and return the eventual response.
    ///
    /// Never panics and never fails synchronously: every failure, including a missing
    /// transport, arrives through the returned future.
    fn request(&self, method: &str, args: Vec<Value>) -> ResponseFuture;

    /// Release the transport. Idempotent.
    fn close(&self);

    fn readiness(&self) -> Readiness {
        Readiness::Immediate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub timestamp: u64,
}

/// Wire shape of every message a factory-built channel sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub method: String,
    pub source: ExecutionContext,
    pub target: String,
    pub data: Value,
    pub metadata: EnvelopeMetadata,
}

impl Envelope {
    /// A single argument travels bare; zero or several travel as an array.
    pub fn new(method: &str, source: ExecutionContext, target: &str, args: Vec<Value>) -> Self {
        let data = if args.len() == 1 {
            args.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(args)
        };

        Self {
            id: new_message_id(),
            method: method.to_string(),
            source,
            target: target.to_string(),
            data,
            metadata: EnvelopeMetadata {
                timestamp: now_millis(),
            },
        }
    }
}

/// Per-channel delivery policy. Unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOptions {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    /// Accepted and surfaced for transports that support it.
    #[serde(default)]
    pub batching: bool,
    /// Accepted and surfaced for transports that support it.
    #[serde(default)]
    pub compression: bool,
}

impl ChannelOptions {
    /// Fill every unset field from `defaults`.
    pub fn or(mut self, defaults: &ChannelOptions) -> Self {
        self.timeout_ms = self.timeout_ms.or(defaults.timeout_ms);
        self.retries = self.retries.or(defaults.retries);
        self.retry_delay_ms = self.retry_delay_ms.or(defaults.retry_delay_ms);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(0)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.unwrap_or(0))
    }
}

/// Caller-owned description of one channel to register.
pub struct ChannelConfig {
    pub name: String,
    pub descriptor: TransportDescriptor,
    pub options: ChannelOptions,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>, descriptor: TransportDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            options: ChannelOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("name", &self.name)
            .field("transport", &self.descriptor.kind())
            .field("options", &self.options)
            .finish()
    }
}
