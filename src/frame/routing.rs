//! Routing helpers layered over normalized frames: socket and tunnel routing
//! overlays, message hook chains, and tunnel peer resolution.

use super::protocol::{normalize_frame, normalize_frame_from};
use super::{NetworkTransport, NormalizedFrame};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Routing metadata a socket server attaches to every frame it accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingContext {
    pub node_id: Option<String>,
    pub peer_id: Option<String>,
    pub gateway_id: Option<String>,
    pub via: Option<String>,
    pub surface: Option<String>,
}

impl RoutingContext {
    fn entries(&self) -> [(&'static str, Option<&String>); 5] {
        [
            ("nodeId", self.node_id.as_ref()),
            ("peerId", self.peer_id.as_ref()),
            ("gatewayId", self.gateway_id.as_ref()),
            ("via", self.via.as_ref()),
            ("surface", self.surface.as_ref()),
        ]
    }
}

/// Normalize a socket frame, then let every set routing field override the frame's own.
pub fn normalize_socket_frame(
    transport: NetworkTransport,
    raw: &Value,
    source_id: &str,
    context: &RoutingContext,
) -> NormalizedFrame {
    let mut frame = normalize_frame_from(transport, raw, source_id);
    for (key, value) in context.entries() {
        if let Some(value) = value {
            frame.extra.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    frame
}

/// Hop metadata recorded on frames relayed through a tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelRouteMeta {
    pub hop_id: Option<String>,
    pub via: Option<String>,
}

pub fn normalize_tunnel_frame(
    raw: &Value,
    source_id: &str,
    route: Option<&TunnelRouteMeta>,
) -> NormalizedFrame {
    let mut frame = normalize_frame_from(NetworkTransport::Tunnel, raw, source_id);
    if let Some(route) = route {
        if let Some(hop_id) = &route.hop_id {
            frame.extra.insert("hopId".into(), Value::String(hop_id.clone()));
        }
        if let Some(via) = &route.via {
            frame.extra.insert("via".into(), Value::String(via.clone()));
        }
    }
    frame
}

/// What a message hook decided about a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Pass the frame on unchanged
    Continue,
    /// Pass this frame on instead
    Replace(NormalizedFrame),
    /// Stop processing; the frame is not delivered
    Drop,
}

pub type MessageHook<C> = Box<dyn Fn(&NormalizedFrame, &C) -> HookOutcome + Send + Sync>;

/// Run `hooks` in order. `None` once any hook drops the frame.
pub fn apply_message_hooks<C>(
    hooks: &[MessageHook<C>],
    frame: NormalizedFrame,
    ctx: &C,
) -> Option<NormalizedFrame> {
    let mut current = frame;
    for (index, hook) in hooks.iter().enumerate() {
        match hook(&current, ctx) {
            HookOutcome::Continue => {}
            HookOutcome::Replace(next) => current = next,
            HookOutcome::Drop => {
                debug!(frame = %current.log_key(), hook = index, "Frame dropped by message hook");
                return None;
            }
        }
    }
    Some(current)
}

/// Where a dispatcher should send a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Broadcast,
    Direct(String),
}

impl Route {
    pub fn of(frame: &NormalizedFrame) -> Self {
        if frame.is_broadcast() {
            Route::Broadcast
        } else {
            Route::Direct(frame.to.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl PeerProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// How a requested tunnel target matched a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Id,
    ExactLabel,
    ContainsLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMatch<'a> {
    pub profile: &'a PeerProfile,
    pub source: MatchSource,
}

/// Resolve `requested` to a peer: by id, then by exact label, then by either label
/// containing the other. All comparisons ignore case.
pub fn resolve_tunnel_target<'a>(peers: &'a [PeerProfile], requested: &str) -> Option<PeerMatch<'a>> {
    let target = requested.trim().to_lowercase();
    if target.is_empty() {
        return None;
    }

    let label_of = |peer: &PeerProfile| peer.label.as_ref().map(|label| label.to_lowercase());

    if let Some(profile) = peers.iter().find(|peer| peer.id.to_lowercase() == target) {
        return Some(PeerMatch {
            profile,
            source: MatchSource::Id,
        });
    }

    if let Some(profile) = peers
        .iter()
        .find(|peer| label_of(*peer).is_some_and(|label| label == target))
    {
        return Some(PeerMatch {
            profile,
            source: MatchSource::ExactLabel,
        });
    }

    peers
        .iter()
        .find(|peer| {
            label_of(*peer).is_some_and(|label| {
                !label.is_empty() && (label.contains(&target) || target.contains(&label))
            })
        })
        .map(|profile| PeerMatch {
            profile,
            source: MatchSource::ContainsLabel,
        })
}

/// Normalize with no transport stamp; used by callers that only route.
pub fn route_raw(raw: &Value, source_id: &str) -> Route {
    Route::of(&normalize_frame(raw, source_id))
}
