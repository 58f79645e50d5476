//! Extension messaging transport.

use super::TransportKind;
use crate::channel::{Channel, Envelope, ResponseFuture};
use crate::context::ExecutionContext;
use crate::error::ChannelError;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Platform inter-process messaging call.
///
/// `send_message` hands the envelope to the platform before returning. The future
/// yields the receiver's response, or the platform's last-error message when delivery
/// failed.
pub trait ExtensionRuntime: Send + Sync {
    fn send_message(&self, envelope: Envelope) -> BoxFuture<'static, Result<Value, String>>;
}

pub struct ExtensionChannel {
    name: String,
    context: ExecutionContext,
    runtime: Arc<dyn ExtensionRuntime>,
    closed: AtomicBool,
}

impl ExtensionChannel {
    pub fn new(
        name: impl Into<String>,
        context: ExecutionContext,
        runtime: Arc<dyn ExtensionRuntime>,
    ) -> Self {
        Self {
            name: name.into(),
            context,
            runtime,
            closed: AtomicBool::new(false),
        }
    }
}

impl Channel for ExtensionChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Extension
    }

    fn request(&self, method: &str, args: Vec<Value>) -> ResponseFuture {
        if self.closed.load(Ordering::Acquire) {
            return future::ready(Err(ChannelError::cancelled(&self.name))).boxed();
        }

        let envelope = Envelope::new(method, self.context, &self.name, args);
        let response = self.runtime.send_message(envelope);
        let name = self.name.clone();
        async move {
            response
                .await
                .map_err(|last_error| ChannelError::delivery(name, last_error))
        }
        .boxed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
