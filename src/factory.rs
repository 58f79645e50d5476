//! Channel Factory
//!
//! Turns a [`TransportDescriptor`] into a live [`Channel`] for the execution context
//! the factory was built for. Creation never fails: when the context cannot provide
//! the transport, the factory hands back a [`NoopChannel`] whose requests reject.

use crate::channel::Channel;
use crate::config::ContextConfig;
use crate::context::{ExecutionContext, HostEnvironment};
use crate::transport::{
    ExtensionChannel, ExtensionRuntime, InProcessChannel, NoopChannel, TransportDescriptor,
    TransportKind, WorkerChannel, WorkerHost,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub struct ChannelFactory {
    context: ExecutionContext,
    dedicated_workers: bool,
    worker_host: Option<Arc<dyn WorkerHost>>,
    extension_runtime: Option<Arc<dyn ExtensionRuntime>>,
}

impl ChannelFactory {
    /// Factory for `context` using the context's default worker policy.
    pub fn new(context: ExecutionContext) -> Self {
        Self::from_host(context, &HostEnvironment::default())
    }

    pub fn from_host(context: ExecutionContext, host: &HostEnvironment) -> Self {
        Self {
            context,
            dedicated_workers: host.supports_dedicated_workers(context),
            worker_host: None,
            extension_runtime: None,
        }
    }

    /// Factory for the context named by `[context]`, or the detected one.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::from_host(config.resolve(), &config.host_environment())
    }

    pub fn with_worker_host(mut self, host: Arc<dyn WorkerHost>) -> Self {
        self.worker_host = Some(host);
        self
    }

    pub fn with_extension_runtime(mut self, runtime: Arc<dyn ExtensionRuntime>) -> Self {
        self.extension_runtime = Some(runtime);
        self
    }

    pub fn with_dedicated_workers(mut self, allowed: bool) -> Self {
        self.dedicated_workers = allowed;
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Whether the transport family can work in this context at all.
    pub fn supports(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::InProcess => true,
            TransportKind::Worker => self.workers_allowed(),
            TransportKind::Extension => {
                self.context == ExecutionContext::ExtensionBackground
                    && self.extension_runtime.is_some()
            }
        }
    }

    fn workers_allowed(&self) -> bool {
        match self.context {
            ExecutionContext::Unknown => false,
            _ => self.dedicated_workers,
        }
    }

    /// `Err` carries the reason `descriptor` cannot be honoured here.
    pub fn availability(&self, descriptor: &TransportDescriptor) -> Result<(), String> {
        let kind = descriptor.kind();
        match descriptor {
            TransportDescriptor::InProcess(_) => Ok(()),
            TransportDescriptor::Script(_) | TransportDescriptor::Worker(_) => {
                if !self.workers_allowed() {
                    return Err(format!("dedicated workers are not available in {} context", self.context));
                }
                if matches!(descriptor, TransportDescriptor::Script(_)) && self.worker_host.is_none() {
                    return Err("no worker host configured".to_string());
                }
                if Handle::try_current().is_err() {
                    return Err("no async runtime to host the worker".to_string());
                }
                Ok(())
            }
            TransportDescriptor::Extension => {
                if self.context != ExecutionContext::ExtensionBackground {
                    return Err(format!("{} messaging requires an extension background context", kind));
                }
                if self.extension_runtime.is_none() {
                    return Err("extension runtime is not reachable".to_string());
                }
                Ok(())
            }
        }
    }

    pub fn create(&self, name: &str, descriptor: TransportDescriptor) -> Arc<dyn Channel> {
        let kind = descriptor.kind();
        if let Err(reason) = self.availability(&descriptor) {
            debug!(channel = name, transport = %kind, context = %self.context, %reason, "Creating no-op channel");
            return self.noop(name, kind, reason);
        }

        match descriptor {
            TransportDescriptor::InProcess(handler) => {
                Arc::new(InProcessChannel::new(name, self.context, handler))
            }
            TransportDescriptor::Worker(port) => {
                Arc::new(WorkerChannel::connect(name, self.context, port))
            }
            TransportDescriptor::Script(script) => {
                let Some(host) = self.worker_host.as_ref() else {
                    return self.noop(name, kind, "no worker host configured".to_string());
                };
                match host.spawn(&script) {
                    Ok(port) => Arc::new(WorkerChannel::connect(name, self.context, port)),
                    Err(reason) => {
                        warn!(channel = name, script = %script, %reason, "Failed to spawn worker");
                        self.noop(name, kind, reason)
                    }
                }
            }
            TransportDescriptor::Extension => match self.extension_runtime.as_ref() {
                Some(runtime) => Arc::new(ExtensionChannel::new(
                    name,
                    self.context,
                    Arc::clone(runtime),
                )),
                None => self.noop(name, kind, "extension runtime is not reachable".to_string()),
            },
        }
    }

    fn noop(&self, name: &str, kind: TransportKind, reason: String) -> Arc<dyn Channel> {
        Arc::new(NoopChannel::new(name, kind, self.context, reason))
    }
}
