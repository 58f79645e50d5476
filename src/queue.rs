//! Queued Channel
//!
//! Wraps a raw [`Channel`] so requests issued before the destination is connected are
//! held in FIFO order and flushed once the channel becomes ready. After readiness,
//! requests pass straight through. The queue also owns the per-request policy: timeout,
//! retry of delivery failures, and cancellation on close.

use crate::channel::{methods, Channel, ChannelOptions, Readiness, ResponseFuture};
use crate::error::ChannelError;
use crate::health::HealthProbe;
use crate::transport::TransportKind;
use async_trait::async_trait;
use futures::future;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Snapshot of a queued channel's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Requests waiting for readiness
    pub pending: usize,
    /// Requests dispatched to the transport and not yet settled
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub channel: String,
    pub transport: TransportKind,
    pub ready: bool,
    pub closed: bool,
    pub stats: QueueStats,
}

/// A request waiting for the channel to become ready
struct QueueEntry {
    method: String,
    args: Vec<Value>,
    enqueued_at: Instant,
    /// Receives the dispatched response once the queue is flushed
    dispatch: oneshot::Sender<ResponseFuture>,
}

struct QueueState {
    ready: bool,
    closed: bool,
    entries: VecDeque<QueueEntry>,
}

struct Shared {
    name: String,
    inner: Arc<dyn Channel>,
    options: ChannelOptions,
    state: Mutex<QueueState>,
    stats: Arc<RwLock<QueueStats>>,
    closed_tx: watch::Sender<bool>,
}

/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct QueuedChannel {
    shared: Arc<Shared>,
}

impl QueuedChannel {
    /// Wrap `inner`. Readiness follows the transport's own signal; transports with
    /// immediate readiness start ready.
    pub fn new(inner: Arc<dyn Channel>, options: ChannelOptions) -> Self {
        let readiness = inner.readiness();
        let ready_now = match &readiness {
            Readiness::Immediate => true,
            Readiness::Pending(signal) => *signal.borrow(),
        };
        let (closed_tx, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            name: inner.name().to_string(),
            inner,
            options,
            state: Mutex::new(QueueState {
                ready: ready_now,
                closed: false,
                entries: VecDeque::new(),
            }),
            stats: Arc::new(RwLock::new(QueueStats::default())),
            closed_tx,
        });

        if let Readiness::Pending(signal) = readiness {
            if !ready_now {
                watch_readiness(Arc::downgrade(&shared), signal);
            }
        }

        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.shared.options
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().ready
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Issue a request. Queued while the channel is not ready; dispatched immediately
    /// otherwise. Settles exactly once.
    pub fn request(&self, method: &str, args: Vec<Value>) -> ResponseFuture {
        let shared = &self.shared;
        let pending = {
            let mut state = shared.state.lock();
            if state.closed {
                return future::ready(Err(ChannelError::cancelled(&shared.name))).boxed();
            }

            if state.ready {
                shared.dispatch(method.to_string(), args)
            } else {
                state.entries.retain(|entry| !entry.dispatch.is_closed());
                let (tx, rx) = oneshot::channel();
                state.entries.push_back(QueueEntry {
                    method: method.to_string(),
                    args,
                    enqueued_at: Instant::now(),
                    dispatch: tx,
                });
                shared.stats.write().pending = state.entries.len();
                debug!(
                    channel = %shared.name,
                    method,
                    queued = state.entries.len(),
                    "Queued request until channel is ready"
                );

                let name = shared.name.clone();
                async move {
                    match rx.await {
                        Ok(response) => response.await,
                        Err(_) => Err(ChannelError::cancelled(name)),
                    }
                }
                .boxed()
            }
        };

        shared.settle(method, pending)
    }

    /// Flip to ready and flush queued requests in arrival order. Returns how many were
    /// dispatched; repeated calls are no-ops.
    pub fn mark_ready(&self) -> usize {
        self.shared.mark_ready()
    }

    /// Ping the transport directly, bypassing the queue. Success marks the channel
    /// ready.
    pub async fn ping(&self) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::cancelled(&self.shared.name));
        }
        self.shared.inner.request(methods::PING, Vec::new()).await?;
        self.mark_ready();
        Ok(())
    }

    /// [`ping`](Self::ping) bounded by `timeout`.
    pub async fn probe(&self, timeout: Duration) -> Result<(), ChannelError> {
        match tokio::time::timeout(timeout, self.ping()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ChannelError::Timeout {
                channel: self.shared.name.clone(),
                method: methods::PING.to_string(),
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Reject every queued request, close the transport, and refuse new requests.
    /// Idempotent.
    pub fn close(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        self.shared.closed_tx.send_replace(true);
        self.shared.stats.write().pending = 0;

        let cancelled = drained.len();
        // Dropping the dispatch senders rejects each waiting caller.
        drop(drained);
        self.shared.inner.close();
        info!(channel = %self.shared.name, cancelled, "Closed channel");
    }

    pub fn status(&self) -> QueueStatus {
        let (ready, closed) = {
            let mut state = self.shared.state.lock();
            // Entries whose caller timed out or went away no longer count as pending.
            state.entries.retain(|entry| !entry.dispatch.is_closed());
            self.shared.stats.write().pending = state.entries.len();
            (state.ready, state.closed)
        };
        QueueStatus {
            channel: self.shared.name.clone(),
            transport: self.shared.inner.transport(),
            ready,
            closed,
            stats: self.shared.stats.read().clone(),
        }
    }
}

fn watch_readiness(shared: Weak<Shared>, mut signal: watch::Receiver<bool>) {
    let Ok(handle) = Handle::try_current() else {
        return;
    };
    handle.spawn(async move {
        if signal.wait_for(|ready| *ready).await.is_ok() {
            if let Some(shared) = shared.upgrade() {
                shared.mark_ready();
            }
        }
    });
}

impl Shared {
    fn mark_ready(&self) -> usize {
        let mut state = self.state.lock();
        if state.ready || state.closed {
            return 0;
        }
        state.ready = true;

        let mut flushed = 0;
        while let Some(entry) = state.entries.pop_front() {
            if entry.dispatch.is_closed() {
                continue;
            }
            debug!(
                channel = %self.name,
                method = %entry.method,
                waited_ms = entry.enqueued_at.elapsed().as_millis() as u64,
                "Flushing queued request"
            );
            let response = self.dispatch(entry.method, entry.args);
            // A caller that gave up in the meantime just drops the response.
            let _ = entry.dispatch.send(response);
            flushed += 1;
        }
        self.stats.write().pending = 0;

        info!(channel = %self.name, flushed, "Channel ready");
        flushed
    }

    /// Start the request on the transport now and retry delivery failures per policy.
    fn dispatch(&self, method: String, args: Vec<Value>) -> ResponseFuture {
        let retries = self.options.retries();
        let retry_delay = self.options.retry_delay();
        let retry_args = (retries > 0).then(|| args.clone());
        let first = self.inner.request(&method, args);

        let inner = Arc::clone(&self.inner);
        let name = self.name.clone();
        let processing = Processing::enter(Arc::clone(&self.stats));

        async move {
            let _processing = processing;
            let mut outcome = first.await;
            let mut attempt = 0;
            while let Err(err) = &outcome {
                let Some(args) = retry_args.as_ref() else {
                    break;
                };
                if !err.is_retryable() || attempt >= retries {
                    break;
                }
                attempt += 1;
                warn!(channel = %name, method = %method, attempt, error = %err, "Retrying request");
                sleep(retry_delay).await;
                outcome = inner.request(&method, args.clone()).await;
            }
            outcome
        }
        .boxed()
    }

    /// Bound `pending` by the close signal and the request timeout, and count the
    /// outcome.
    fn settle(&self, method: &str, pending: ResponseFuture) -> ResponseFuture {
        let closed = self.closed_tx.subscribe();
        let name = self.name.clone();
        let method = method.to_string();
        let timeout = self.options.timeout();
        let stats = Arc::clone(&self.stats);

        async move {
            let guarded = async {
                tokio::select! {
                    biased;
                    _ = wait_closed(closed) => Err(ChannelError::cancelled(name.clone())),
                    outcome = pending => outcome,
                }
            };
            let outcome = match timeout {
                Some(budget) => match tokio::time::timeout(budget, guarded).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ChannelError::Timeout {
                        channel: name.clone(),
                        method: method.clone(),
                        after_ms: budget.as_millis() as u64,
                    }),
                },
                None => guarded.await,
            };

            {
                let mut stats = stats.write();
                match &outcome {
                    Ok(_) => stats.completed += 1,
                    Err(_) => stats.failed += 1,
                }
            }
            outcome
        }
        .boxed()
    }
}

/// Resolves once the channel is closed. Never resolves if the queue itself is gone.
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    if closed.wait_for(|closed| *closed).await.is_err() {
        future::pending::<()>().await;
    }
}

/// Counts a dispatched request as processing until it settles or is dropped.
struct Processing(Arc<RwLock<QueueStats>>);

impl Processing {
    fn enter(stats: Arc<RwLock<QueueStats>>) -> Self {
        stats.write().processing += 1;
        Self(stats)
    }
}

impl Drop for Processing {
    fn drop(&mut self) {
        let mut stats = self.0.write();
        stats.processing = stats.processing.saturating_sub(1);
    }
}

impl Channel for QueuedChannel {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn transport(&self) -> TransportKind {
        self.shared.inner.transport()
    }

    fn request(&self, method: &str, args: Vec<Value>) -> ResponseFuture {
        QueuedChannel::request(self, method, args)
    }

    fn close(&self) {
        QueuedChannel::close(self)
    }
}

#[async_trait]
impl HealthProbe for QueuedChannel {
    async fn probe(&self) -> Result<(), String> {
        self.ping().await.map_err(|err| err.to_string())
    }
}
