//! Transport adapters behind the [`Channel`](crate::channel::Channel) contract.
//!
//! - **in-process** - direct handler invocation in this process
//! - **worker** - postMessage-style pairing with a worker (spawned by script name or
//!   handed over as a ready port)
//! - **extension** - the extension's inter-process messaging call
//! - **no-op** - fail-fast stub used when a transport is unavailable
mod extension;
mod in_process;
mod noop;
mod worker;

pub use extension::{ExtensionChannel, ExtensionRuntime};
pub use in_process::InProcessChannel;
pub use noop::NoopChannel;
pub use worker::{
    spawn_worker, TaskWorkerHost, WorkerChannel, WorkerEndpoint, WorkerHost, WorkerPort,
    WorkerReply,
};

use crate::channel::Envelope;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Destination-side request handler. Invoking it starts the work; the returned future
/// resolves to the response or to an error message.
pub type Handler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    Arc::new(move |envelope| f(envelope).boxed())
}

/// Transport family, used for availability checks and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    InProcess,
    Worker,
    Extension,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::InProcess => "in-process",
            TransportKind::Worker => "worker",
            TransportKind::Extension => "extension",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a channel config points at.
pub enum TransportDescriptor {
    /// Call this handler directly.
    InProcess(Handler),
    /// Spawn a worker through the factory's worker host.
    Script(String),
    /// Talk to an already running worker.
    Worker(WorkerPort),
    /// Use the extension messaging runtime.
    Extension,
}

impl TransportDescriptor {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportDescriptor::InProcess(_) => TransportKind::InProcess,
            TransportDescriptor::Script(_) | TransportDescriptor::Worker(_) => TransportKind::Worker,
            TransportDescriptor::Extension => TransportKind::Extension,
        }
    }
}

impl fmt::Debug for TransportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportDescriptor::InProcess(_) => f.write_str("InProcess(..)"),
            TransportDescriptor::Script(script) => f.debug_tuple("Script").field(script).finish(),
            TransportDescriptor::Worker(_) => f.write_str("Worker(..)"),
            TransportDescriptor::Extension => f.write_str("Extension"),
        }
    }
}
