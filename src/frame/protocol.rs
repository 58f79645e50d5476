//! Frame normalisation. Every function here is total: malformed input degrades to
//! defaults and nothing returns an error.

use super::{
    NetworkTransport, NormalizedFrame, BROADCAST_TARGET, DEFAULT_FRAME_TYPE, DEFAULT_MODE,
    DEFAULT_NAMESPACE, UNKNOWN_SOURCE,
};
use serde_json::{Map, Value};

const PAYLOAD_FIELDS: [&str; 4] = ["payload", "data", "body", "message"];
const TARGET_FIELDS: [&str; 5] = ["to", "target", "targetId", "target_id", "deviceId"];
const BROADCAST_ALIASES: [&str; 3] = ["broadcast", "all", "*"];

/// Fields the normalized frame always sets itself.
const CANONICAL_FIELDS: [&str; 8] = [
    "type",
    "from",
    "to",
    "target",
    "namespace",
    "payload",
    "mode",
    "transport",
];

fn as_object(raw: &Value) -> Option<&Map<String, Value>> {
    raw.as_object()
}

/// Trimmed string value of `key`, or `None` when absent, not a string, or blank.
fn pick_string<'a>(frame: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a str> {
    frame?
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn first_string<'a>(frame: Option<&'a Map<String, Value>>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| pick_string(frame, key))
}

/// First body field present (a JSON `null` counts as present), else the whole frame.
pub fn extract_payload(raw: &Value) -> Value {
    let Some(frame) = as_object(raw) else {
        return Value::Object(Map::new());
    };
    PAYLOAD_FIELDS
        .iter()
        .find_map(|key| frame.get(*key))
        .cloned()
        .unwrap_or_else(|| Value::Object(frame.clone()))
}

/// Addressee of the frame, `"broadcast"` when none is named.
pub fn resolve_target(raw: &Value) -> String {
    first_string(as_object(raw), &TARGET_FIELDS)
        .unwrap_or(BROADCAST_TARGET)
        .to_string()
}

/// Explicit `broadcast: true`, or a target matching a broadcast alias in any case.
pub fn is_broadcast_frame(raw: &Value) -> bool {
    let flagged = as_object(raw)
        .and_then(|frame| frame.get("broadcast"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    flagged || is_broadcast_target(&resolve_target(raw))
}

/// Whether `target` is one of the broadcast aliases, in any case.
pub fn is_broadcast_target(target: &str) -> bool {
    BROADCAST_ALIASES
        .iter()
        .any(|alias| target.eq_ignore_ascii_case(alias))
}

pub fn resolve_mode(raw: &Value) -> String {
    pick_string(as_object(raw), "mode")
        .unwrap_or(DEFAULT_MODE)
        .to_string()
}

/// Canonicalise `raw`. `source_id` stands in for a missing `from`.
pub fn normalize_frame(raw: &Value, source_id: &str) -> NormalizedFrame {
    let frame = as_object(raw);
    let target = resolve_target(raw);
    let payload = extract_payload(raw);
    let frame_type = first_string(frame, &["type", "action"]).unwrap_or(DEFAULT_FRAME_TYPE);
    let from = pick_string(frame, "from")
        .or_else(|| Some(source_id.trim()).filter(|id| !id.is_empty()))
        .unwrap_or(UNKNOWN_SOURCE);
    let namespace = first_string(frame, &["namespace", "ns"]).unwrap_or(DEFAULT_NAMESPACE);

    let transport = pick_string(frame, "transport").and_then(|name| name.parse().ok());
    let mut extra = frame.cloned().unwrap_or_default();
    for key in CANONICAL_FIELDS {
        if key == "transport" && transport.is_none() {
            continue;
        }
        extra.remove(key);
    }

    NormalizedFrame {
        frame_type: frame_type.to_string(),
        from: from.to_string(),
        to: target.clone(),
        target,
        namespace: namespace.to_string(),
        payload,
        mode: resolve_mode(raw),
        transport,
        extra,
    }
}

/// [`normalize_frame`] stamped with the transport the frame arrived over.
pub fn normalize_frame_from(
    transport: NetworkTransport,
    raw: &Value,
    source_id: &str,
) -> NormalizedFrame {
    let mut frame = normalize_frame(raw, source_id);
    frame.extra.remove("transport");
    frame.transport = Some(transport);
    frame
}

/// `"{from}=>{to}/{namespace}/{type}/{mode}"`
pub fn build_frame_log_key(frame: &NormalizedFrame) -> String {
    format!(
        "{}=>{}/{}/{}/{}",
        frame.from, frame.to, frame.namespace, frame.frame_type, frame.mode
    )
}
