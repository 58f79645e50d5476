//! Fail-fast stand-in for a transport the current context cannot provide.

use super::TransportKind;
use crate::channel::{Channel, ResponseFuture};
use crate::context::ExecutionContext;
use crate::error::ChannelError;
use futures::future;
use futures::FutureExt;
use serde_json::Value;

pub struct NoopChannel {
    name: String,
    transport: TransportKind,
    context: ExecutionContext,
    reason: String,
}

impl NoopChannel {
    pub fn new(
        name: impl Into<String>,
        transport: TransportKind,
        context: ExecutionContext,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            context,
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Channel for NoopChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> TransportKind {
        self.transport
    }

    fn request(&self, _method: &str, _args: Vec<Value>) -> ResponseFuture {
        future::ready(Err(ChannelError::TransportUnavailable {
            channel: self.name.clone(),
            transport: self.transport,
            context: self.context,
            reason: self.reason.clone(),
        }))
        .boxed()
    }

    fn close(&self) {}
}
