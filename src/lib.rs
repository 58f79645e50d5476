//! Uniform: Cross-Context Channel Orchestration
//!
//! Named request/response channels over in-process, worker and extension transports,
//! with readiness-aware queueing, periodic liveness probing, and normalization of raw
//! network frames into one canonical shape.

pub mod channel;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod frame;
pub mod health;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod telemetry;
pub mod transport;

pub use channel::{Channel, ChannelConfig, ChannelOptions, Envelope, Readiness, ResponseFuture};
pub use context::ExecutionContext;
pub use error::{ApiError, ChannelError};
pub use factory::ChannelFactory;
pub use frame::NormalizedFrame;
pub use health::{ChannelHealthRecord, HealthMonitor, HealthProbe};
pub use queue::QueuedChannel;
pub use registry::{ChannelRegistry, RegistryKey};
