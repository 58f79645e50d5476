//! Network Frames
//!
//! Inbound and outbound frames arrive over several network transports that each name
//! their fields a little differently. [`normalize_frame`] folds every one of them into
//! a single [`NormalizedFrame`] so dispatchers never branch on the transport.

pub mod protocol;
pub mod routing;

pub use protocol::{
    build_frame_log_key, extract_payload, is_broadcast_frame, is_broadcast_target, normalize_frame,
    normalize_frame_from, resolve_mode, resolve_target,
};
pub use routing::{
    apply_message_hooks, normalize_socket_frame, normalize_tunnel_frame, resolve_tunnel_target,
    route_raw, HookOutcome, MatchSource, MessageHook, PeerMatch, PeerProfile, Route,
    RoutingContext, TunnelRouteMeta,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_FRAME_TYPE: &str = "dispatch";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_MODE: &str = "blind";
pub const BROADCAST_TARGET: &str = "broadcast";
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Network-edge transport a frame arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkTransport {
    Ws,
    #[serde(rename = "socketio")]
    SocketIo,
    Http,
    Tunnel,
}

impl NetworkTransport {
    pub const ALL: [NetworkTransport; 4] = [
        NetworkTransport::Ws,
        NetworkTransport::SocketIo,
        NetworkTransport::Http,
        NetworkTransport::Tunnel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkTransport::Ws => "ws",
            NetworkTransport::SocketIo => "socketio",
            NetworkTransport::Http => "http",
            NetworkTransport::Tunnel => "tunnel",
        }
    }
}

impl fmt::Display for NetworkTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Ok(NetworkTransport::Ws),
            "socketio" | "socket.io" => Ok(NetworkTransport::SocketIo),
            "http" | "https" => Ok(NetworkTransport::Http),
            "tunnel" => Ok(NetworkTransport::Tunnel),
            other => Err(format!("unknown network transport '{}'", other)),
        }
    }
}

/// Delivery mode named by a frame's `mode` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Relay without looking inside
    Blind,
    Secure,
    Inspect,
    Broadcast,
    Relay,
    Other(String),
}

impl DeliveryMode {
    pub fn parse(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "blind" => DeliveryMode::Blind,
            "secure" => DeliveryMode::Secure,
            "inspect" => DeliveryMode::Inspect,
            "broadcast" => DeliveryMode::Broadcast,
            "relay" => DeliveryMode::Relay,
            _ => DeliveryMode::Other(mode.to_string()),
        }
    }
}

/// Canonical frame. Every required field is populated; raw fields with no canonical
/// slot are kept verbatim in `extra`. A `transport` value that names no known
/// transport stays in `extra`, so a serialized frame always reads back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireFrame")]
pub struct NormalizedFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub from: String,
    pub to: String,
    /// Same as `to`
    pub target: String,
    pub namespace: String,
    pub payload: Value,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<NetworkTransport>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Serialized form of [`NormalizedFrame`]; `transport` is lifted out of the extra
/// fields only when it names a known transport.
#[derive(Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    frame_type: String,
    from: String,
    to: String,
    target: String,
    namespace: String,
    payload: Value,
    mode: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireFrame> for NormalizedFrame {
    fn from(wire: WireFrame) -> Self {
        let mut extra = wire.extra;
        let transport = extra
            .get("transport")
            .and_then(Value::as_str)
            .and_then(|name| name.parse().ok());
        if transport.is_some() {
            extra.remove("transport");
        }

        NormalizedFrame {
            frame_type: wire.frame_type,
            from: wire.from,
            to: wire.to,
            target: wire.target,
            namespace: wire.namespace,
            payload: wire.payload,
            mode: wire.mode,
            transport,
            extra,
        }
    }
}

impl NormalizedFrame {
    pub fn is_broadcast(&self) -> bool {
        let flagged = self
            .extra
            .get("broadcast")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        flagged || is_broadcast_target(&self.to)
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::parse(&self.mode)
    }

    pub fn log_key(&self) -> String {
        build_frame_log_key(self)
    }

    pub fn to_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert("type".into(), Value::String(self.frame_type.clone()));
        object.insert("from".into(), Value::String(self.from.clone()));
        object.insert("to".into(), Value::String(self.to.clone()));
        object.insert("target".into(), Value::String(self.target.clone()));
        object.insert("namespace".into(), Value::String(self.namespace.clone()));
        object.insert("payload".into(), self.payload.clone());
        object.insert("mode".into(), Value::String(self.mode.clone()));
        if let Some(transport) = self.transport {
            object.insert("transport".into(), Value::String(transport.as_str().into()));
        }
        Value::Object(object)
    }
}
