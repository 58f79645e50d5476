//! In-process transport: the destination lives in the same execution context.

use super::{Handler, TransportKind};
use crate::channel::{Channel, Envelope, ResponseFuture};
use crate::context::ExecutionContext;
use crate::error::ChannelError;
use futures::future;
use futures::FutureExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct InProcessChannel {
    name: String,
    context: ExecutionContext,
    handler: Handler,
    closed: AtomicBool,
}

impl InProcessChannel {
    pub fn new(name: impl Into<String>, context: ExecutionContext, handler: Handler) -> Self {
        Self {
            name: name.into(),
            context,
            handler,
            closed: AtomicBool::new(false),
        }
    }
}

impl Channel for InProcessChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> TransportKind {
        TransportKind::InProcess
    }

    fn request(&self, method: &str, args: Vec<Value>) -> ResponseFuture {
        if self.closed.load(Ordering::Acquire) {
            return future::ready(Err(ChannelError::cancelled(&self.name))).boxed();
        }

        let envelope = Envelope::new(method, self.context, &self.name, args);
        let response = (self.handler)(envelope);
        let name = self.name.clone();
        async move {
            response
                .await
                .map_err(|message| ChannelError::delivery(name, message))
        }
        .boxed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
