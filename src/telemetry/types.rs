//! Shared telemetry helpers: timestamps and message id generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate an envelope id: time prefix, then process id and a per-process sequence.
///
/// Unique within a session; not meant to be unguessable.
pub fn new_message_id() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("msg-{ts:x}-{pid:x}-{seq:x}")
}
