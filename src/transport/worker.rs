//! Worker-hosted transport.
//!
//! A worker is a task on the async runtime reached over a pair of unbounded queues.
//! The host side posts [`Envelope`]s into the inbox; the worker answers with
//! [`WorkerReply`] messages on the outbox, starting with a single `Ready` once it
//! accepts traffic. Responses are correlated back to callers by envelope id.

use super::{Handler, TransportKind};
use crate::channel::{Channel, Envelope, Readiness, ResponseFuture};
use crate::context::ExecutionContext;
use crate::error::ChannelError;
use futures::future;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Message from a worker back to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The worker is connected and accepts requests.
    Ready,
    Response {
        id: String,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl WorkerReply {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        WorkerReply::Response {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        WorkerReply::Response {
            id: id.into(),
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Host side of a worker connection.
pub struct WorkerPort {
    pub inbox: mpsc::UnboundedSender<Envelope>,
    pub outbox: mpsc::UnboundedReceiver<WorkerReply>,
}

/// Worker side of a worker connection.
pub struct WorkerEndpoint {
    pub requests: mpsc::UnboundedReceiver<Envelope>,
    pub replies: mpsc::UnboundedSender<WorkerReply>,
}

impl WorkerPort {
    /// A connected host/worker pair.
    pub fn pair() -> (WorkerPort, WorkerEndpoint) {
        let (inbox, requests) = mpsc::unbounded_channel();
        let (replies, outbox) = mpsc::unbounded_channel();
        (WorkerPort { inbox, outbox }, WorkerEndpoint { requests, replies })
    }
}

/// Run `handler` as a worker task. Must be called from within a Tokio runtime.
pub fn spawn_worker(handler: Handler) -> WorkerPort {
    let (port, endpoint) = WorkerPort::pair();
    tokio::spawn(serve(endpoint, handler));
    port
}

async fn serve(endpoint: WorkerEndpoint, handler: Handler) {
    let WorkerEndpoint {
        mut requests,
        replies,
    } = endpoint;

    if replies.send(WorkerReply::Ready).is_err() {
        return;
    }

    let mut in_flight = FuturesUnordered::new();
    loop {
        tokio::select! {
            incoming = requests.recv() => match incoming {
                Some(envelope) => {
                    let id = envelope.id.clone();
                    let response = handler(envelope);
                    in_flight.push(async move { (id, response.await) });
                }
                None => break,
            },
            Some((id, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                let _ = replies.send(to_reply(id, outcome));
            }
        }
    }

    while let Some((id, outcome)) = in_flight.next().await {
        let _ = replies.send(to_reply(id, outcome));
    }
}

fn to_reply(id: String, outcome: Result<Value, String>) -> WorkerReply {
    match outcome {
        Ok(result) => WorkerReply::ok(id, result),
        Err(error) => WorkerReply::err(id, error),
    }
}

/// Creates workers from a script identifier.
pub trait WorkerHost: Send + Sync {
    fn spawn(&self, script: &str) -> Result<WorkerPort, String>;
}

/// [`WorkerHost`] that runs registered handlers as runtime tasks.
#[derive(Default)]
pub struct TaskWorkerHost {
    scripts: RwLock<HashMap<String, Handler>>,
}

impl TaskWorkerHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, script: impl Into<String>, handler: Handler) {
        self.scripts.write().insert(script.into(), handler);
    }

    pub fn with_script(self, script: impl Into<String>, handler: Handler) -> Self {
        self.register(script, handler);
        self
    }
}

impl WorkerHost for TaskWorkerHost {
    fn spawn(&self, script: &str) -> Result<WorkerPort, String> {
        let handler = self
            .scripts
            .read()
            .get(script)
            .cloned()
            .ok_or_else(|| format!("no worker script registered as '{}'", script))?;
        if Handle::try_current().is_err() {
            return Err("no async runtime to host the worker".to_string());
        }
        Ok(spawn_worker(handler))
    }
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, ChannelError>>>>>;

/// Channel over a [`WorkerPort`]. Must be created from within a Tokio runtime.
pub struct WorkerChannel {
    name: String,
    context: ExecutionContext,
    inbox: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    pending: PendingMap,
    ready: watch::Receiver<bool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerChannel {
    pub fn connect(name: impl Into<String>, context: ExecutionContext, port: WorkerPort) -> Self {
        let name = name.into();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready) = watch::channel(false);
        let reader = tokio::spawn(read_replies(
            name.clone(),
            port.outbox,
            Arc::clone(&pending),
            ready_tx,
        ));

        Self {
            name,
            context,
            inbox: Mutex::new(Some(port.inbox)),
            pending,
            ready,
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

async fn read_replies(
    name: String,
    mut outbox: mpsc::UnboundedReceiver<WorkerReply>,
    pending: PendingMap,
    ready: watch::Sender<bool>,
) {
    while let Some(reply) = outbox.recv().await {
        match reply {
            WorkerReply::Ready => {
                debug!(channel = %name, "Worker connected");
                ready.send_replace(true);
            }
            WorkerReply::Response { id, result, error } => {
                let Some(sender) = pending.lock().remove(&id) else {
                    debug!(channel = %name, id = %id, "Dropping reply with no pending request");
                    continue;
                };
                let outcome = match error {
                    Some(message) => Err(ChannelError::delivery(&name, message)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                let _ = sender.send(outcome);
            }
        }
    }

    let orphaned: Vec<_> = pending.lock().drain().collect();
    if !orphaned.is_empty() {
        warn!(channel = %name, pending = orphaned.len(), "Worker terminated with requests in flight");
    }
    for (_, sender) in orphaned {
        let _ = sender.send(Err(ChannelError::delivery(&name, "worker terminated")));
    }
}

/// Removes a request's entry from the pending map when its caller settles or gives
/// up, so a worker that never answers cannot grow the map.
struct PendingSlot {
    pending: PendingMap,
    id: String,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

impl Channel for WorkerChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Worker
    }

    fn request(&self, method: &str, args: Vec<Value>) -> ResponseFuture {
        let envelope = Envelope::new(method, self.context, &self.name, args);
        let id = envelope.id.clone();
        let (tx, rx) = oneshot::channel();

        let posted = {
            let inbox = self.inbox.lock();
            match inbox.as_ref() {
                None => Err(ChannelError::cancelled(&self.name)),
                Some(inbox) => {
                    self.pending.lock().insert(id.clone(), tx);
                    inbox
                        .send(envelope)
                        .map_err(|_| ChannelError::delivery(&self.name, "worker inbox closed"))
                }
            }
        };
        if let Err(err) = posted {
            self.pending.lock().remove(&id);
            return future::ready(Err(err)).boxed();
        }

        let name = self.name.clone();
        let slot = PendingSlot {
            pending: Arc::clone(&self.pending),
            id,
        };
        async move {
            let _slot = slot;
            rx.await
                .unwrap_or_else(|_| Err(ChannelError::cancelled(name)))
        }
        .boxed()
    }

    fn close(&self) {
        if self.inbox.lock().take().is_none() {
            return;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        let cancelled: Vec<_> = self.pending.lock().drain().collect();
        for (_, sender) in cancelled {
            let _ = sender.send(Err(ChannelError::cancelled(&self.name)));
        }
    }

    fn readiness(&self) -> Readiness {
        Readiness::Pending(self.ready.clone())
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}
