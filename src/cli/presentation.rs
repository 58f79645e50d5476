//! CLI presentation: text and JSON rendering of command results.

use crate::config::ValidationError;
use crate::context::{ExecutionContext, HostEnvironment};
use crate::frame::NormalizedFrame;
use crate::transport::TransportKind;
use serde_json::json;

pub fn format_frame_json(frame: &NormalizedFrame) -> String {
    let rendered = json!({
        "frame": frame,
        "log_key": frame.log_key(),
        "broadcast": frame.is_broadcast(),
    });
    serde_json::to_string_pretty(&rendered).unwrap_or_else(|_| rendered.to_string())
}

pub fn format_frame_text(frame: &NormalizedFrame) -> String {
    let transport = frame
        .transport
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    let payload = serde_json::to_string(&frame.payload).unwrap_or_default();
    let mut lines = vec![
        frame.log_key(),
        format!("  route:     {}", if frame.is_broadcast() { "broadcast" } else { "direct" }),
        format!("  transport: {}", transport),
        format!("  payload:   {}", payload),
    ];
    if !frame.extra.is_empty() {
        let mut keys: Vec<&String> = frame.extra.keys().collect();
        keys.sort();
        let keys: Vec<&str> = keys.into_iter().map(String::as_str).collect();
        lines.push(format!("  extra:     {}", keys.join(", ")));
    }
    lines.join("\n")
}

pub fn format_context_json(
    context: ExecutionContext,
    host: &HostEnvironment,
    transports: &[(TransportKind, bool)],
) -> String {
    let supported: serde_json::Map<String, serde_json::Value> = transports
        .iter()
        .map(|(kind, ok)| (kind.to_string(), json!(ok)))
        .collect();
    let rendered = json!({
        "context": context,
        "host": {
            "document": host.document,
            "worker_scope": host.worker_scope,
            "extension_runtime": host.extension_runtime,
            "dedicated_workers": host.supports_dedicated_workers(context),
        },
        "transports": supported,
    });
    serde_json::to_string_pretty(&rendered).unwrap_or_else(|_| rendered.to_string())
}

pub fn format_context_text(
    context: ExecutionContext,
    host: &HostEnvironment,
    transports: &[(TransportKind, bool)],
) -> String {
    let mut lines = vec![format!("Execution context: {}", context)];
    lines.push(format!(
        "Host: document={} worker_scope={} extension_runtime={} dedicated_workers={}",
        host.document,
        host.worker_scope,
        host.extension_runtime,
        host.supports_dedicated_workers(context)
    ));
    lines.push("Transports:".to_string());
    for (kind, supported) in transports {
        let mark = if *supported { "available" } else { "unavailable" };
        lines.push(format!("  {:<11} {}", kind.to_string(), mark));
    }
    lines.join("\n")
}

pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    let mut lines = vec![format!("Configuration has {} problem(s):", errors.len())];
    lines.extend(errors.iter().map(|e| format!("  - {}", e)));
    lines.join("\n")
}
